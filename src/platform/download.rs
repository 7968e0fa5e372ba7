//! Attachment downloads shared by the platform clients

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::{WorkspaceError, WorkspaceResult};
use crate::models::Attachment;

/// Resolve an attachment URL, which platforms often report relative to
/// their own root
pub fn resolve_url(base: &str, raw: &str) -> WorkspaceResult<reqwest::Url> {
    let failed = |reason: String| WorkspaceError::AttachmentDownloadFailed {
        name: raw.to_string(),
        reason,
    };

    if let Ok(absolute) = reqwest::Url::parse(raw) {
        return Ok(absolute);
    }
    let base = reqwest::Url::parse(&format!("{}/", base.trim_end_matches('/')))
        .map_err(|e| failed(e.to_string()))?;
    base.join(raw.trim_start_matches('/'))
        .map_err(|e| failed(e.to_string()))
}

/// File name for an attachment: its declared name, else the last URL segment
pub fn file_name(attachment: &Attachment) -> WorkspaceResult<String> {
    let candidate = if attachment.name.trim().is_empty() {
        name_from_url(&attachment.url)
    } else {
        attachment.name.trim().to_string()
    };

    let sanitized: String = candidate
        .chars()
        .map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
        .collect();

    if sanitized.is_empty() || sanitized == "." || sanitized == ".." {
        return Err(WorkspaceError::AttachmentDownloadFailed {
            name: attachment.url.clone(),
            reason: "attachment has no usable file name".to_string(),
        });
    }
    Ok(sanitized)
}

/// Last path segment of a URL, query and fragment removed
pub fn name_from_url(url: &str) -> String {
    let path = url.split(['?', '#']).next().unwrap_or(url);
    path.rsplit('/').next().unwrap_or(path).to_string()
}

/// Send `request` and write the body to `dest_dir/name` through a temporary
/// file. Does nothing if the target already exists.
pub async fn save(
    request: reqwest::RequestBuilder,
    attachment: &Attachment,
    dest_dir: &Path,
) -> WorkspaceResult<PathBuf> {
    let name = file_name(attachment)?;
    let dest = dest_dir.join(&name);
    let failed = |reason: String| WorkspaceError::AttachmentDownloadFailed {
        name: name.clone(),
        reason,
    };

    if dest.exists() {
        debug!(path = %dest.display(), "Attachment already present");
        return Ok(dest);
    }

    let response = request.send().await.map_err(|e| failed(e.to_string()))?;
    if !response.status().is_success() {
        return Err(failed(format!("server returned {}", response.status())));
    }
    let bytes = response.bytes().await.map_err(|e| failed(e.to_string()))?;

    tokio::fs::create_dir_all(dest_dir)
        .await
        .map_err(|e| failed(e.to_string()))?;

    let tmp_path = dest_dir.join(format!(".{}.part", name));
    tokio::fs::write(&tmp_path, &bytes)
        .await
        .map_err(|e| failed(e.to_string()))?;
    if let Err(err) = tokio::fs::rename(&tmp_path, &dest).await {
        let _ = tokio::fs::remove_file(&tmp_path).await;
        return Err(failed(err.to_string()));
    }

    debug!(path = %dest.display(), size_bytes = bytes.len(), "Attachment downloaded");
    Ok(dest)
}

#[cfg(test)]
mod tests {
    use super::*;
    use httpmock::prelude::*;
    use tempfile::tempdir;

    fn attachment(name: &str, url: &str) -> Attachment {
        Attachment {
            name: name.to_string(),
            url: url.to_string(),
        }
    }

    #[test]
    fn test_resolve_relative_and_absolute() {
        let relative = resolve_url("https://ctf.example.com/", "/files/abc/vuln?token=x").unwrap();
        assert_eq!(relative.as_str(), "https://ctf.example.com/files/abc/vuln?token=x");

        let absolute = resolve_url("https://ctf.example.com", "https://cdn.example.net/a.zip").unwrap();
        assert_eq!(absolute.host_str(), Some("cdn.example.net"));
    }

    #[test]
    fn test_file_name_sources() {
        assert_eq!(file_name(&attachment("libc.so.6", "/x")).unwrap(), "libc.so.6");
        assert_eq!(
            file_name(&attachment("", "/files/abc/chall.tar.gz?token=1")).unwrap(),
            "chall.tar.gz"
        );
        assert_eq!(file_name(&attachment("../etc/passwd", "/x")).unwrap(), ".._etc_passwd");
        assert!(file_name(&attachment("", "/files/")).is_err());
    }

    #[tokio::test]
    async fn test_save_writes_once() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET).path("/files/vuln");
            then.status(200).body("\x7fELF");
        });
        let dir = tempdir().unwrap();
        let http = reqwest::Client::new();
        let vuln = attachment("vuln", "/files/vuln");

        let path = save(http.get(server.url("/files/vuln")), &vuln, dir.path())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"\x7fELF");

        save(http.get(server.url("/files/vuln")), &vuln, dir.path())
            .await
            .unwrap();
        mock.assert_hits(1);

        let leftovers = std::fs::read_dir(dir.path())
            .unwrap()
            .filter(|e| e.as_ref().unwrap().file_name().to_string_lossy().ends_with(".part"))
            .count();
        assert_eq!(leftovers, 0);
    }

    #[tokio::test]
    async fn test_save_reports_http_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.path("/files/missing");
            then.status(404);
        });
        let dir = tempdir().unwrap();

        let result = save(
            reqwest::Client::new().get(server.url("/files/missing")),
            &attachment("missing", "/files/missing"),
            dir.path(),
        )
        .await;

        assert!(matches!(
            result,
            Err(WorkspaceError::AttachmentDownloadFailed { ref name, .. }) if name == "missing"
        ));
        assert!(!dir.path().join("missing").exists());
    }
}
