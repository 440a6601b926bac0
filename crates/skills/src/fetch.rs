use std::{io::ErrorKind, time::Duration};

use {async_trait::async_trait, uasp_config::FetchConfig};

use crate::{error::FetchError, source::SkillSource};

/// Retrieves raw document text for a source and a path relative to it.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, source: &SkillSource, relative_path: &str) -> Result<String, FetchError>;
}

/// Reads local sources from disk and remote sources over HTTP from a
/// raw-file host.
pub struct DefaultFetcher {
    client: reqwest::Client,
    raw_base_url: String,
}

impl DefaultFetcher {
    pub fn new(config: &FetchConfig) -> Result<Self, FetchError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .build()?;
        Ok(Self {
            client,
            raw_base_url: config.raw_base_url.trim_end_matches('/').to_string(),
        })
    }

    fn raw_url(&self, owner: &str, repo: &str, git_ref: &str, path: &str) -> String {
        format!("{}/{owner}/{repo}/{git_ref}/{path}", self.raw_base_url)
    }
}

#[async_trait]
impl ContentFetcher for DefaultFetcher {
    async fn fetch(&self, source: &SkillSource, relative_path: &str) -> Result<String, FetchError> {
        match source {
            SkillSource::Local { path } => {
                let file = path.join(relative_path);
                tracing::debug!(path = %file.display(), "reading local skill file");
                match tokio::fs::read_to_string(&file).await {
                    Ok(text) => Ok(text),
                    Err(e) if e.kind() == ErrorKind::NotFound => Err(FetchError::NotFound {
                        location: file.display().to_string(),
                    }),
                    Err(source) => Err(FetchError::Io { path: file, source }),
                }
            },
            SkillSource::Github {
                owner,
                repo,
                git_ref,
                ..
            } => {
                let url = self.raw_url(owner, repo, git_ref, &source.skill_path(relative_path));
                tracing::debug!(%url, "fetching skill file");
                let resp = self.client.get(&url).send().await?;
                let status = resp.status();
                if status == reqwest::StatusCode::NOT_FOUND {
                    return Err(FetchError::NotFound { location: url });
                }
                if !status.is_success() {
                    return Err(FetchError::Status {
                        location: url,
                        status: status.as_u16(),
                    });
                }
                Ok(resp.text().await?)
            },
        }
    }
}

/// Run a fetch under an optional deadline.
pub async fn fetch_with_timeout(
    fetcher: &dyn ContentFetcher,
    source: &SkillSource,
    relative_path: &str,
    timeout: Option<Duration>,
) -> Result<String, FetchError> {
    let Some(limit) = timeout else {
        return fetcher.fetch(source, relative_path).await;
    };
    match tokio::time::timeout(limit, fetcher.fetch(source, relative_path)).await {
        Ok(result) => result,
        Err(_) => Err(FetchError::Timeout {
            location: source.skill_path(relative_path),
            secs: limit.as_secs(),
        }),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn fetcher_for(base: &str) -> DefaultFetcher {
        DefaultFetcher::new(&FetchConfig {
            raw_base_url: base.to_string(),
            ..FetchConfig::default()
        })
        .unwrap()
    }

    fn remote(subpath: Option<&str>) -> SkillSource {
        SkillSource::Github {
            owner: "acme".into(),
            repo: "skills".into(),
            git_ref: "main".into(),
            subpath: subpath.map(Into::into),
        }
    }

    #[tokio::test]
    async fn fetches_raw_file_under_subpath() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/acme/skills/main/catalog/demo/demo.uasp.yaml")
            .match_header("user-agent", mockito::Matcher::Regex("^uasp/".into()))
            .with_status(200)
            .with_body("meta: {}\n")
            .create_async()
            .await;

        let text = fetcher_for(&server.url())
            .fetch(&remote(Some("catalog")), "demo/demo.uasp.yaml")
            .await
            .unwrap();
        assert_eq!(text, "meta: {}\n");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn maps_404_to_not_found() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/acme/skills/main/missing.uasp.yaml")
            .with_status(404)
            .create_async()
            .await;

        let err = fetcher_for(&server.url())
            .fetch(&remote(None), "missing.uasp.yaml")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn other_statuses_are_errors() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/acme/skills/main/index.json")
            .with_status(503)
            .create_async()
            .await;

        let err = fetcher_for(&server.url())
            .fetch(&remote(None), "index.json")
            .await
            .unwrap_err();
        assert!(matches!(err, FetchError::Status { status: 503, .. }));
    }

    #[tokio::test]
    async fn local_sources_read_from_disk() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(tmp.path().join("demo")).unwrap();
        std::fs::write(tmp.path().join("demo/demo.uasp.yaml"), "local").unwrap();
        let source = SkillSource::Local {
            path: tmp.path().to_path_buf(),
        };
        // Unroutable base: a network attempt would fail.
        let fetcher = fetcher_for("http://127.0.0.1:9");

        assert_eq!(fetcher.fetch(&source, "demo/demo.uasp.yaml").await.unwrap(), "local");
        let err = fetcher.fetch(&source, "other/other.uasp.yaml").await.unwrap_err();
        assert!(err.is_not_found());
    }

    struct Stalled;

    #[async_trait]
    impl ContentFetcher for Stalled {
        async fn fetch(&self, _: &SkillSource, _: &str) -> Result<String, FetchError> {
            tokio::time::sleep(Duration::from_secs(60)).await;
            Ok(String::new())
        }
    }

    #[tokio::test]
    async fn timeout_is_reported() {
        let err = fetch_with_timeout(
            &Stalled,
            &remote(None),
            "x.uasp.yaml",
            Some(Duration::from_millis(20)),
        )
        .await
        .unwrap_err();
        assert_eq!(err.kind(), "timeout");
    }
}
