//! Generated resource names

use chrono::Utc;
use uuid::Uuid;

/// `{timestamp}-{5 hex chars}`, unique per call
pub fn timestamped_unique_name() -> String {
    let timestamp = Utc::now().format("%Y-%m-%d-%H-%M-%S-%3f");
    let unique_id = Uuid::new_v4().simple().to_string();
    format!("{}-{}", timestamp, &unique_id[..5])
}

/// Name of the staging bucket provisioned for a project and location
pub fn staging_bucket_name(project: &str, location: &str) -> String {
    format!("{}-vertex-staging-{}", project, location)
}

/// Display name with the current time appended
pub fn generate_display_name(prefix: &str) -> String {
    format!("{} {}", prefix, Utc::now().format("%Y-%m-%d %H:%M:%S%.3f"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timestamped_unique_name_shape() {
        let name = timestamped_unique_name();
        let parts: Vec<&str> = name.split('-').collect();

        // year, month, day, hour, minute, second, millis, token
        assert_eq!(parts.len(), 8);
        assert_eq!(parts[6].len(), 3);
        assert_eq!(parts[7].len(), 5);
        assert!(parts[7].chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn test_timestamped_unique_names_differ() {
        assert_ne!(timestamped_unique_name(), timestamped_unique_name());
    }

    #[test]
    fn test_staging_bucket_name() {
        assert_eq!(
            staging_bucket_name("my-project", "us-central1"),
            "my-project-vertex-staging-us-central1"
        );
    }

    #[test]
    fn test_generate_display_name() {
        let name = generate_display_name("sklearn model");
        assert!(name.starts_with("sklearn model "));
        assert!(name.len() > "sklearn model ".len());
    }
}
