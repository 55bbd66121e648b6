/// Terminal failure of an upstream call, after retries where they apply.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UpstreamError {
    #[error("upstream timed out after {attempts} attempt(s)")]
    Timeout { attempts: u32 },

    #[error("upstream unreachable after {attempts} attempt(s): {message}")]
    Network { attempts: u32, message: String },

    #[error("upstream returned HTTP {status} after {attempts} attempt(s): {body}")]
    Status {
        attempts: u32,
        status: u16,
        body: String,
    },

    /// A 2xx response whose body could not be understood. Never retried.
    #[error("malformed upstream response: {0}")]
    Parse(String),
}

impl UpstreamError {
    /// Number of requests made before giving up (1 for parse failures).
    pub fn attempts(&self) -> u32 {
        match self {
            UpstreamError::Timeout { attempts }
            | UpstreamError::Network { attempts, .. }
            | UpstreamError::Status { attempts, .. } => *attempts,
            UpstreamError::Parse(_) => 1,
        }
    }
}

/// Failure to hand a message to the messaging transport.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum DeliveryError {
    /// The transport rejected the message's rich-text markup.
    #[error("formatting rejected: {0}")]
    Format(String),

    #[error("transport error: {0}")]
    Transport(String),
}

/// Failure inside the dispatch pipeline, caught at the dispatcher boundary.
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("delivery failed: {0}")]
    Delivery(#[from] DeliveryError),

    #[error("internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn attempts_reports_requests_made() {
        assert_eq!(UpstreamError::Timeout { attempts: 3 }.attempts(), 3);
        assert_eq!(
            UpstreamError::Network { attempts: 2, message: "refused".into() }.attempts(),
            2
        );
        assert_eq!(
            UpstreamError::Status { attempts: 3, status: 503, body: String::new() }.attempts(),
            3
        );
        assert_eq!(UpstreamError::Parse("bad json".into()).attempts(), 1);
    }
}
