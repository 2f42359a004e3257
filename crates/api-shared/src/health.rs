use crate::dto::HealthRes;

/// Liveness answer for the REST `/health` route.
pub struct HealthService;

impl HealthService {
    pub fn check_health() -> HealthRes {
        HealthRes {
            ok: true,
            message: "Clinic submissions service is alive".into(),
        }
    }
}
