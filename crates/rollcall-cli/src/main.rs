use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

#[derive(Parser)]
#[command(name = "rollcall", about = "Rollcall face registry CLI", version)]
struct Cli {
    /// Base URL of the rollcalld HTTP server
    #[arg(long, global = true, env = "ROLLCALL_SERVER", default_value = "http://127.0.0.1:5000")]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Enroll a new user from a face image
    Enroll {
        #[arg(long)]
        id: String,
        #[arg(long)]
        name: String,
        /// "student" or "staff"
        #[arg(long)]
        role: String,
        /// Image file containing the user's face
        #[arg(long)]
        image: PathBuf,
        /// Date of birth (students)
        #[arg(long)]
        dob: Option<String>,
        /// University seat number (students)
        #[arg(long)]
        usn: Option<String>,
        /// Grade-point value (students)
        #[arg(long)]
        cgpa: Option<String>,
        /// Department (staff)
        #[arg(long)]
        department: Option<String>,
        /// Designation (staff)
        #[arg(long)]
        designation: Option<String>,
    },
    /// Identify the face in an image
    Identify {
        #[arg(long)]
        image: PathBuf,
    },
    /// Search enrolled users by field
    Search {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        usn: Option<String>,
        #[arg(long)]
        department: Option<String>,
        #[arg(long)]
        designation: Option<String>,
        #[arg(long)]
        role: Option<String>,
    },
    /// Show daemon status
    Status,
}

#[derive(Serialize)]
struct EnrollRequest {
    user_id: String,
    name: String,
    role: String,
    image: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    dob: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    usn: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    cgpa: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    department: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    designation: Option<String>,
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let client = reqwest::Client::new();
    let base = cli.server.trim_end_matches('/');

    let request = match cli.command {
        Commands::Enroll {
            id,
            name,
            role,
            image,
            dob,
            usn,
            cgpa,
            department,
            designation,
        } => {
            let body = EnrollRequest {
                user_id: id,
                name,
                role,
                image: read_data_url(&image)?,
                dob,
                usn,
                cgpa,
                department,
                designation,
            };
            client.post(format!("{base}/register-user")).json(&body)
        }
        Commands::Identify { image } => {
            let body = serde_json::json!({ "image": read_data_url(&image)? });
            client.post(format!("{base}/identify-user")).json(&body)
        }
        Commands::Search {
            name,
            usn,
            department,
            designation,
            role,
        } => {
            let query: Vec<(&str, String)> = [
                ("name", name),
                ("usn", usn),
                ("department", department),
                ("designation", designation),
                ("role", role),
            ]
            .into_iter()
            .filter_map(|(k, v)| v.map(|v| (k, v)))
            .collect();
            client.get(format!("{base}/search-user")).query(&query)
        }
        Commands::Status => client.get(format!("{base}/status")),
    };

    tracing::debug!(server = base, "sending request");
    let response = request
        .send()
        .await
        .with_context(|| format!("failed to reach rollcalld at {base}"))?;
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .with_context(|| format!("unexpected response from rollcalld (HTTP {status})"))?;

    println!("{}", serde_json::to_string_pretty(&body)?);

    if body.get("success").and_then(Value::as_bool) == Some(true) {
        Ok(ExitCode::SUCCESS)
    } else {
        tracing::debug!(%status, "request did not succeed");
        Ok(ExitCode::FAILURE)
    }
}

/// Read an image file and encode it as a `data:` URL.
fn read_data_url(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).with_context(|| format!("failed to read {}", path.display()))?;
    Ok(data_url(mime_for(path), &bytes))
}

fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

fn mime_for(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase);
    match ext.as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("webp") => "image/webp",
        Some("tif" | "tiff") => "image/tiff",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_from_extension() {
        assert_eq!(mime_for(Path::new("face.JPG")), "image/jpeg");
        assert_eq!(mime_for(Path::new("/tmp/a.png")), "image/png");
        assert_eq!(mime_for(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn test_data_url() {
        assert_eq!(data_url("image/png", b"hello"), "data:image/png;base64,aGVsbG8=");
    }

    #[test]
    fn test_enroll_request_omits_unset_fields() {
        let req = EnrollRequest {
            user_id: "t1".into(),
            name: "Ravi".into(),
            role: "staff".into(),
            image: "data:image/png;base64,".into(),
            dob: None,
            usn: None,
            cgpa: None,
            department: Some("CSE".into()),
            designation: Some("Professor".into()),
        };
        let v = serde_json::to_value(&req).unwrap();
        assert!(v.get("usn").is_none());
        assert_eq!(v["department"], "CSE");
    }

    #[test]
    fn test_cli_parses_search() {
        let cli = Cli::try_parse_from(["rollcall", "--server", "http://h:1", "search", "--role", "staff"]).unwrap();
        assert_eq!(cli.server, "http://h:1");
        assert!(matches!(cli.command, Commands::Search { role: Some(ref r), .. } if r == "staff"));
    }
}
