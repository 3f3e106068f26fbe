use uuid::Uuid;

/// Process-unique instance id: `<service_name>-<32 hex chars>`.
pub fn generate_instance_id(service_name: &str) -> String {
    format!("{}-{}", service_name, Uuid::new_v4().simple())
}
