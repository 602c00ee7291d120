//! Template contexts: serializable rendering payloads.

use serde::{Deserialize, Serialize};

use crate::error::RenderError;

/// Payload for the review-routing file written into each cloned repository.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GitReviewCtx {
    /// Target project path on the review server.
    pub project: String,
    /// Review-server host name or address.
    pub host: String,
    pub port: u16,
}

/// Payload for the jenkins-job-builder `jenkins_jobs.ini`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JjbConfigCtx {
    pub username: String,
    pub password: String,
    pub jenkins_url: String,
}

/// Convert any serializable context to a [`tera::Context`].
pub fn to_tera_context<T: Serialize>(ctx: &T) -> Result<tera::Context, RenderError> {
    tera::Context::from_serialize(ctx).map_err(RenderError::from)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gitreview_ctx_converts() {
        let ctx = GitReviewCtx {
            project: "openstack/neutron".into(),
            host: "10.0.0.1".into(),
            port: 29418,
        };
        let tera_ctx = to_tera_context(&ctx).expect("context conversion");
        assert_eq!(
            tera_ctx.get("port"),
            Some(&serde_json::Value::from(29418u16))
        );
    }
}
