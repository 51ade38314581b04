//! [`DistributedFsIO`] over the WebHDFS REST API.
//!
//! `hdfs://host:port/path` URIs name the namenode RPC endpoint; WebHDFS is served on the
//! namenode's HTTP port instead, so requests go to
//! `http://host:{http_port}/webhdfs/v1/path?op=...`.
//!
//! ## Operations
//!
//! - `OPEN`: GET, the namenode redirects to a datanode which streams the content
//! - `LISTSTATUS`: GET, one JSON document for a single directory level
//! - `CREATE`: two steps; a bodiless PUT to the namenode answers `307` with a datanode
//!   `Location`, and the content is PUT there

use crate::config::DfsConfig;
use crate::error::{ErrorKind, Result, ResultExt, SeqError};
use crate::io::cloud::http::{build_client, check_status, read_body, send};
use crate::io::cloud::traits::{DfsEntry, DfsEntryKind, DfsPath, DistributedFsIO};
use log::debug;
use reqwest::blocking::Client;
use reqwest::header::LOCATION;
use reqwest::redirect::Policy;
use serde::Deserialize;
use url::Url;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ListStatusResponse {
    file_statuses: FileStatuses,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct FileStatuses {
    #[serde(default)]
    file_status: Vec<FileStatus>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FileStatus {
    path_suffix: String,
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    length: u64,
}

pub struct WebHdfsIO {
    /// Follows the OPEN redirect to the datanode.
    client: Client,
    /// Leaves the CREATE redirect to us so the body goes only to the datanode.
    no_redirect: Client,
    http_port: u16,
    user: Option<String>,
}

impl WebHdfsIO {
    /// # Errors
    ///
    /// Returns `Transport` if the HTTP clients cannot be built
    pub fn new(config: &DfsConfig) -> Result<Self> {
        Ok(Self {
            client: build_client(config, Policy::limited(10))?,
            no_redirect: build_client(config, Policy::none())?,
            http_port: config.http_port,
            user: config.user.clone(),
        })
    }

    fn url(&self, path: &DfsPath, op: &str, extra: &[(&str, &str)]) -> Result<Url> {
        let host = path.authority.split(':').next().unwrap_or_default();
        if host.is_empty() {
            return Err(SeqError::invalid_uri(&path.to_string(), "missing namenode host"));
        }
        let base = format!("http://{host}:{}/webhdfs/v1{}", self.http_port, path.path);
        let mut url = Url::parse(&base)
            .context_kind(ErrorKind::InvalidUri, || format!("bad WebHDFS URL {base}"))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("op", op);
            if let Some(user) = &self.user {
                query.append_pair("user.name", user);
            }
            for (name, value) in extra {
                query.append_pair(name, value);
            }
        }
        Ok(url)
    }
}

fn parse_list_status(body: &[u8], what: &str) -> Result<Vec<DfsEntry>> {
    let response: ListStatusResponse = serde_json::from_slice(body)
        .context_kind(ErrorKind::Transport, || format!("{what}: malformed LISTSTATUS"))?;
    Ok(response
        .file_statuses
        .file_status
        .into_iter()
        .map(|status| DfsEntry {
            name: status.path_suffix,
            kind: match status.kind.as_str() {
                "DIRECTORY" => DfsEntryKind::Directory,
                "SYMLINK" => DfsEntryKind::Symlink,
                _ => DfsEntryKind::File,
            },
            length: status.length,
        })
        .collect())
}

impl DistributedFsIO for WebHdfsIO {
    fn open(&self, path: &DfsPath) -> Result<Vec<u8>> {
        let what = path.to_string();
        let url = self.url(path, "OPEN", &[])?;
        let body = read_body(send(self.client.get(url), &what)?, &what)?;
        debug!("fetched {what}: {} bytes", body.len());
        Ok(body)
    }

    fn list_status(&self, dir: &DfsPath) -> Result<Vec<DfsEntry>> {
        let what = format!("listing {dir}");
        let url = self.url(dir, "LISTSTATUS", &[])?;
        let body = read_body(send(self.client.get(url), &what)?, &what)?;
        parse_list_status(&body, &what)
    }

    fn create(&self, path: &DfsPath, data: &[u8], overwrite: bool) -> Result<()> {
        let what = format!("creating {path}");
        let overwrite = if overwrite { "true" } else { "false" };
        let url = self.url(path, "CREATE", &[("overwrite", overwrite)])?;

        let response = send(self.no_redirect.put(url), &what)?;
        if !response.status().is_redirection() {
            check_status(response, &what)?;
            return Err(SeqError::transport(format!(
                "{what}: namenode did not redirect to a datanode"
            )));
        }
        let location = response
            .headers()
            .get(LOCATION)
            .and_then(|v| v.to_str().ok())
            .map(ToString::to_string)
            .ok_or_else(|| SeqError::transport(format!("{what}: redirect without Location")))?;

        let upload = self
            .no_redirect
            .put(location)
            .header("content-type", "application/octet-stream")
            .body(data.to_vec());
        check_status(send(upload, &what)?, &what)?;
        debug!("wrote {path}: {} bytes", data.len());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn list_status_json_maps_entry_kinds() {
        let body = br#"{"FileStatuses":{"FileStatus":[
            {"accessTime":0,"blockSize":134217728,"group":"supergroup","length":24930,
             "modificationTime":1320171722771,"owner":"webuser","pathSuffix":"a.patch",
             "permission":"644","replication":1,"type":"FILE"},
            {"length":0,"pathSuffix":"bar","type":"DIRECTORY"}
        ]}}"#;
        let entries = parse_list_status(body, "test").unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].name, "a.patch");
        assert_eq!(entries[0].kind, DfsEntryKind::File);
        assert_eq!(entries[0].length, 24930);
        assert_eq!(entries[1].kind, DfsEntryKind::Directory);
    }

    #[test]
    fn urls_target_the_http_port() {
        let config = DfsConfig {
            user: Some("etl".into()),
            ..DfsConfig::default()
        };
        let fs = WebHdfsIO::new(&config).unwrap();
        let url = fs
            .url(&DfsPath::new("nn.example:8020", "/data/in"), "LISTSTATUS", &[])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "http://nn.example:9870/webhdfs/v1/data/in?op=LISTSTATUS&user.name=etl"
        );
    }

    #[test]
    fn malformed_listing_is_a_transport_error() {
        let err = parse_list_status(b"<html>", "test").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Transport);
    }
}
