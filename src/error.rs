use thiserror::Error;

#[derive(Error, Debug)]
pub enum Cat365Error {
    #[error("Authentication failed: {0}")]
    AuthError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Graph API error: {0}")]
    GraphApiError(String),

    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("Token not found. Please run 'cat365 login' first")]
    TokenNotFound,

    #[error("Tenant '{0}' not found")]
    TenantNotFound(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, Cat365Error>;

// Alias used throughout the command modules
pub use Cat365Error as Error;

/// Parse Graph API error response and provide helpful context
pub fn enhance_graph_error(error_response: &str) -> String {
    // Try to parse as JSON to extract error details
    if let Ok(error_json) = serde_json::from_str::<serde_json::Value>(error_response) {
        if let Some(error_obj) = error_json.get("error") {
            let code = error_obj
                .get("code")
                .and_then(|c| c.as_str())
                .unwrap_or("Unknown");
            let message = error_obj
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("No message");

            // Provide helpful context for common errors
            let hint = match code {
                "Unauthorized" | "InvalidAuthenticationToken" => {
                    "\nHint: Your authentication token may have expired. Try running 'cat365 login' again."
                }
                "Forbidden" | "InsufficientPrivileges" | "Authorization_RequestDenied" => {
                    "\nHint: Check that your app registration has DeviceManagementManagedDevices.ReadWrite.All and User.Read.All with admin consent."
                }
                "NotFound" | "Request_ResourceNotFound" => {
                    "\nHint: The requested resource doesn't exist. Check IDs and resource names."
                }
                "TooManyRequests" => {
                    "\nHint: API rate limit exceeded. Wait a moment and try again."
                }
                _ => "",
            };

            return format!("{}: {}{}", code, message, hint);
        }
    }

    // If we can't parse it, return the raw error
    error_response.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enhance_graph_error_parses_code_and_message() {
        let body = r#"{"error":{"code":"NotFound","message":"Device not found."}}"#;
        let enhanced = enhance_graph_error(body);
        assert!(enhanced.starts_with("NotFound: Device not found."));
        assert!(enhanced.contains("Hint:"));
    }

    #[test]
    fn test_enhance_graph_error_passes_through_non_json() {
        assert_eq!(enhance_graph_error("gateway timeout"), "gateway timeout");
    }
}
