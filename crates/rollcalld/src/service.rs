//! Registry operations: enrollment, identification, search and status.

use rollcall_core::{EuclideanMatcher, Matcher, Role, RoleFields, SearchFilter, UserRecord};
use std::sync::Arc;

use crate::engine::EngineHandle;
use crate::error::{RegistryError, RegistryResult};
use crate::models::{decode_image_payload, IdentifyUser, RegisterUser, SearchQuery, StatusResponse};
use crate::store::RecordStore;

/// Enrollment, identification and search over a [`RecordStore`].
pub struct RegistryService<S: RecordStore> {
    store: Arc<S>,
    engine: EngineHandle,
    matcher: Arc<dyn Matcher + Send + Sync>,
    threshold: f32,
}

impl<S: RecordStore> RegistryService<S> {
    pub fn new(store: S, engine: EngineHandle, threshold: f32) -> Self {
        Self {
            store: Arc::new(store),
            engine,
            matcher: Arc::new(EuclideanMatcher),
            threshold,
        }
    }

    /// Enroll a new user from one face image.
    ///
    /// Checks run in a fixed order: required fields, role, role fields,
    /// duplicate id, then inference. Nothing is written unless all pass.
    pub async fn register(&self, input: RegisterUser) -> RegistryResult<UserRecord> {
        let (id, name, role, image) = match (
            present(&input.user_id),
            present(&input.name),
            present(&input.role),
            present(&input.image),
        ) {
            (Some(id), Some(name), Some(role), Some(image)) => (id, name, role, image),
            _ => {
                let missing = missing_names(&[
                    ("user_id", &input.user_id),
                    ("name", &input.name),
                    ("role", &input.role),
                    ("image", &input.image),
                ]);
                return Err(RegistryError::Validation(format!(
                    "Missing required fields: {missing}."
                )));
            }
        };

        let role: Role = role.parse()?;
        let fields = role_fields(role, &input)?;

        if self.store.exists(id).await? {
            return Err(RegistryError::DuplicateUser(id.to_string()));
        }

        let bytes = decode_image_payload(image)?;
        let embedded = self.engine.embed(bytes).await?;

        let record = UserRecord {
            id: id.to_string(),
            name: name.to_string(),
            fields,
            descriptor: embedded.descriptor,
            created_at: chrono::Utc::now().to_rfc3339(),
        };
        self.store.insert(record.clone()).await?;

        tracing::info!(
            user_id = %record.id,
            %role,
            faces = embedded.faces_found,
            confidence = embedded.bbox.confidence,
            "user enrolled"
        );
        Ok(record)
    }

    /// Find the enrolled user closest to the face in `input`.
    ///
    /// `Ok(None)` is the normal negative outcome: no record lies strictly
    /// within the match threshold.
    pub async fn identify(&self, input: IdentifyUser) -> RegistryResult<Option<UserRecord>> {
        let image = present(&input.image)
            .ok_or_else(|| RegistryError::Validation("Missing required fields: image.".into()))?;

        let bytes = decode_image_payload(image)?;
        let embedded = self.engine.embed(bytes).await?;

        let mut gallery = self.store.all().await?;
        let result = self
            .matcher
            .compare(&embedded.descriptor, &gallery, self.threshold)?;

        match result.index {
            Some(idx) if result.matched => {
                let record = gallery.swap_remove(idx);
                tracing::info!(
                    user_id = %record.id,
                    distance = result.distance,
                    faces = embedded.faces_found,
                    "user identified"
                );
                Ok(Some(record))
            }
            _ => {
                tracing::info!(
                    closest = result.distance,
                    records = gallery.len(),
                    faces = embedded.faces_found,
                    "no matching user"
                );
                Ok(None)
            }
        }
    }

    /// All records matching every supplied filter, in enrollment order.
    ///
    /// A role filter naming no known role matches nothing.
    pub async fn search(&self, query: SearchQuery) -> RegistryResult<Vec<UserRecord>> {
        let role = match query.role.as_deref().filter(|r| !r.is_empty()) {
            Some(r) => match r.parse::<Role>() {
                Ok(role) => Some(role),
                Err(e) => {
                    tracing::debug!(error = %e, "search role matches no records");
                    return Ok(Vec::new());
                }
            },
            None => None,
        };
        let filter = SearchFilter {
            name: query.name,
            usn: query.usn,
            department: query.department,
            designation: query.designation,
            role,
        }
        .normalized();

        let records = self.store.all().await?;
        let total = records.len();
        let found: Vec<UserRecord> = records.into_iter().filter(|r| filter.matches(r)).collect();

        tracing::debug!(?filter, total, found = found.len(), "search");
        Ok(found)
    }

    pub async fn status(&self) -> RegistryResult<StatusResponse> {
        Ok(StatusResponse {
            success: true,
            version: env!("CARGO_PKG_VERSION"),
            records: self.store.count().await?,
            face_policy: self.engine.policy(),
            match_threshold: self.threshold,
        })
    }
}

/// The trimmed-nonempty view of an optional request field.
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.trim().is_empty())
}

fn missing_names(fields: &[(&str, &Option<String>)]) -> String {
    fields
        .iter()
        .filter(|(_, v)| present(v).is_none())
        .map(|(name, _)| *name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn role_fields(role: Role, input: &RegisterUser) -> RegistryResult<RoleFields> {
    match role {
        Role::Student => match (present(&input.dob), present(&input.usn), present(&input.cgpa)) {
            (Some(dob), Some(usn), Some(cgpa)) => Ok(RoleFields::Student {
                dob: dob.to_string(),
                usn: usn.to_string(),
                cgpa: cgpa.to_string(),
            }),
            _ => Err(RegistryError::Validation(format!(
                "Missing student details: {}.",
                missing_names(&[("dob", &input.dob), ("usn", &input.usn), ("cgpa", &input.cgpa)])
            ))),
        },
        Role::Staff => match (present(&input.department), present(&input.designation)) {
            (Some(department), Some(designation)) => Ok(RoleFields::Staff {
                department: department.to_string(),
                designation: designation.to_string(),
            }),
            _ => Err(RegistryError::Validation(format!(
                "Missing staff details: {}.",
                missing_names(&[
                    ("department", &input.department),
                    ("designation", &input.designation),
                ])
            ))),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::spawn_engine;
    use crate::error::ErrorKind;
    use crate::store::{MemoryStore, SqliteStore};
    use crate::testing::{data_url, png, BrokenProvider, FakeProvider};
    use rollcall_core::{FacePolicy, DEFAULT_MATCH_THRESHOLD};

    fn service() -> RegistryService<MemoryStore> {
        let engine = spawn_engine(Box::new(FakeProvider), FacePolicy::First).unwrap();
        RegistryService::new(MemoryStore::new(), engine, DEFAULT_MATCH_THRESHOLD)
    }

    /// An image whose single face has descriptor `[r/100, g/100]`.
    fn face(r: u8, g: u8) -> String {
        data_url(&png(&[(r, g, 10)]))
    }

    fn student(id: &str, image: String) -> RegisterUser {
        RegisterUser {
            user_id: Some(id.into()),
            name: Some(format!("Student {id}")),
            role: Some("student".into()),
            image: Some(image),
            dob: Some("2002-03-04".into()),
            usn: Some(format!("1RV21CS{id}")),
            cgpa: Some("8.9".into()),
            ..Default::default()
        }
    }

    fn staff(id: &str, image: String) -> RegisterUser {
        RegisterUser {
            user_id: Some(id.into()),
            name: Some(format!("Staff {id}")),
            role: Some("staff".into()),
            image: Some(image),
            department: Some("Physics".into()),
            designation: Some("Professor".into()),
            ..Default::default()
        }
    }

    fn identify(image: String) -> IdentifyUser {
        IdentifyUser { image: Some(image) }
    }

    #[tokio::test]
    async fn test_duplicate_enrollment_rejected_regardless_of_payload() {
        let svc = service();
        svc.register(student("001", face(10, 10))).await.unwrap();

        let err = svc.register(staff("001", face(90, 90))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateUser);
        assert_eq!(svc.status().await.unwrap().records, 1);
    }

    #[tokio::test]
    async fn test_duplicate_checked_before_inference() {
        let svc = service();
        svc.register(student("001", face(10, 10))).await.unwrap();

        // No face in this image; the duplicate id wins.
        let err = svc
            .register(student("001", data_url(&png(&[(1, 1, 0)]))))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::DuplicateUser);
    }

    #[tokio::test]
    async fn test_staff_requires_designation() {
        let svc = service();
        let mut input = staff("t1", face(10, 10));
        input.designation = None;
        let err = svc.register(input).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert!(err.to_string().contains("designation"));

        svc.register(staff("t1", face(10, 10))).await.unwrap();
    }

    #[tokio::test]
    async fn test_unknown_role_rejected() {
        let svc = service();
        let mut input = student("g1", face(10, 10));
        input.role = Some("guardian".into());
        let err = svc.register(input).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidRole);
    }

    #[tokio::test]
    async fn test_missing_required_fields_listed() {
        let svc = service();
        let input = RegisterUser {
            user_id: Some("   ".into()),
            name: Some("Asha".into()),
            role: Some("student".into()),
            ..Default::default()
        };
        let err = svc.register(input).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
        assert_eq!(err.to_string(), "Missing required fields: user_id, image.");
    }

    #[tokio::test]
    async fn test_enrollment_without_face() {
        let svc = service();
        let err = svc
            .register(student("s1", data_url(&png(&[(5, 5, 0)]))))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoFaceDetected);
        assert_eq!(svc.status().await.unwrap().records, 0);
    }

    #[tokio::test]
    async fn test_bad_image_is_validation_error() {
        let svc = service();
        let err = svc
            .register(student("s1", "data:image/png;base64,bm90IGFuIGltYWdl".into()))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ValidationError);
    }

    #[tokio::test]
    async fn test_identify_empty_registry() {
        let svc = service();
        assert!(svc.identify(identify(face(0, 0))).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identify_picks_closest_within_threshold() {
        let svc = service();
        svc.register(student("far", face(50, 0))).await.unwrap();
        svc.register(student("near", face(20, 0))).await.unwrap();

        let found = svc.identify(identify(face(0, 0))).await.unwrap().unwrap();
        assert_eq!(found.id, "near");
    }

    #[tokio::test]
    async fn test_identify_threshold_is_strict() {
        let svc = service();
        svc.register(student("edge", face(40, 0))).await.unwrap();
        assert!(svc.identify(identify(face(0, 0))).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_identify_no_face() {
        let svc = service();
        let err = svc
            .identify(identify(data_url(&png(&[(5, 5, 0)]))))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoFaceDetected);
    }

    #[tokio::test]
    async fn test_enroll_identify_roundtrip_sqlite() {
        let engine = spawn_engine(Box::new(FakeProvider), FacePolicy::First).unwrap();
        let store = SqliteStore::open_in_memory().await.unwrap();
        let svc = RegistryService::new(store, engine, DEFAULT_MATCH_THRESHOLD);

        let mut input = student("s7", face(33, 66));
        input.cgpa = Some("9.50".into());
        let enrolled = svc.register(input).await.unwrap();

        let found = svc.identify(identify(face(33, 66))).await.unwrap().unwrap();
        assert_eq!(found.fields, enrolled.fields);
        assert_eq!(
            found.fields,
            RoleFields::Student {
                dob: "2002-03-04".into(),
                usn: "1RV21CSs7".into(),
                cgpa: "9.50".into(),
            }
        );
    }

    #[tokio::test]
    async fn test_search_by_role() {
        let svc = service();
        svc.register(student("s1", face(10, 0))).await.unwrap();
        svc.register(staff("t1", face(20, 0))).await.unwrap();
        svc.register(student("s2", face(30, 0))).await.unwrap();
        svc.register(staff("t2", face(40, 0))).await.unwrap();

        let query = SearchQuery { role: Some("staff".into()), ..Default::default() };
        let ids: Vec<String> = svc.search(query).await.unwrap().into_iter().map(|r| r.id).collect();
        assert_eq!(ids, vec!["t1", "t2"]);
    }

    #[tokio::test]
    async fn test_search_empty_filters_are_ignored() {
        let svc = service();
        svc.register(student("s1", face(10, 0))).await.unwrap();
        svc.register(staff("t1", face(20, 0))).await.unwrap();

        let query = SearchQuery {
            name: Some(String::new()),
            role: Some(String::new()),
            ..Default::default()
        };
        assert_eq!(svc.search(query).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_search_unknown_role_matches_nothing() {
        let svc = service();
        svc.register(student("s1", face(10, 0))).await.unwrap();
        svc.register(staff("t1", face(20, 0))).await.unwrap();

        let query = SearchQuery { role: Some("admin".into()), ..Default::default() };
        assert!(svc.search(query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_provider_failure_is_internal() {
        let engine = spawn_engine(Box::new(BrokenProvider), FacePolicy::First).unwrap();
        let svc = RegistryService::new(MemoryStore::new(), engine, DEFAULT_MATCH_THRESHOLD);

        let err = svc.identify(identify(face(1, 1))).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InternalError);
        assert_eq!(err.public_message(), "internal error");
    }

    #[tokio::test]
    async fn test_status_reports_configuration() {
        let engine = spawn_engine(Box::new(FakeProvider), FacePolicy::Largest).unwrap();
        let svc = RegistryService::new(MemoryStore::new(), engine, 0.35);
        svc.register(staff("t1", face(1, 1))).await.unwrap();

        let status = svc.status().await.unwrap();
        assert!(status.success);
        assert_eq!(status.records, 1);
        assert_eq!(status.face_policy, FacePolicy::Largest);
        assert_eq!(status.match_threshold, 0.35);
    }
}
