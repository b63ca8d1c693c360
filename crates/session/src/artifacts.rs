// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact uploads: stream a file or directory tree to a destination URL
//! and post a per-file MD5 manifest alongside.

use std::path::{Path, PathBuf};

use md5::{Digest, Md5};
use reqwest::multipart::{Form, Part};

use crate::error::UploadError;
use crate::glob::join_slash;

/// Streams artifacts to one base URL (artifact or property endpoint).
pub struct Uploader {
    client: reqwest::Client,
    base_url: String,
}

impl Uploader {
    pub fn new(client: reqwest::Client, base_url: String) -> Self {
        Self { client, base_url }
    }

    /// Destination URL for one upload: `<base>/<buildId>/<destDir>`, with
    /// the trailing segment omitted for the default root.
    pub fn build_dest_url(&self, dest_dir: &str, build_id: &str) -> String {
        let url = join_slash(self.base_url.trim_end_matches('/'), build_id);
        join_slash(&url, dest_dir)
    }

    /// Upload `source` (file or directory) so each contained file appears at
    /// `dest_path/<relative>` server-side, then post the checksum manifest.
    pub async fn upload(
        &self,
        source: &Path,
        dest_path: &str,
        dest_url: &str,
    ) -> Result<(), UploadError> {
        let entries = collect_entries(source, dest_path)?;

        let mut form = Form::new();
        let mut manifest: Vec<(String, String)> = Vec::with_capacity(entries.len());
        for (file, dest) in entries {
            let bytes = tokio::fs::read(&file).await.map_err(|source| UploadError::Read {
                path: file.display().to_string(),
                source,
            })?;
            manifest.push((dest.clone(), format!("{:x}", Md5::digest(&bytes))));
            form = form.part("file", Part::bytes(bytes).file_name(dest));
        }

        self.post(source, dest_url, form).await?;
        self.post_checksums(source, dest_url, manifest).await
    }

    /// Post the `<destPath>=<md5hex>` manifest, sorted by destPath, with a
    /// properties-style comment header.
    async fn post_checksums(
        &self,
        source: &Path,
        dest_url: &str,
        mut manifest: Vec<(String, String)>,
    ) -> Result<(), UploadError> {
        manifest.sort();
        let mut text = String::from("# md5 artifact checksums\n");
        for (dest, digest) in manifest {
            text.push_str(&dest);
            text.push('=');
            text.push_str(&digest);
            text.push('\n');
        }
        let form = Form::new().part("checksum", Part::text(text).file_name("checksum.properties"));
        self.post(source, dest_url, form).await
    }

    async fn post(&self, source: &Path, url: &str, form: Form) -> Result<(), UploadError> {
        let resp = self
            .client
            .post(url)
            .multipart(form)
            .send()
            .await
            .map_err(|source_err| UploadError::Http {
                path: source.display().to_string(),
                url: url.to_string(),
                source: source_err,
            })?;
        if !resp.status().is_success() {
            return Err(UploadError::Rejected { url: url.to_string(), status: resp.status().as_u16() });
        }
        Ok(())
    }
}

/// Flatten `source` into `(file, destPath)` pairs. Directories walk
/// depth-first with lexicographic order inside each directory.
fn collect_entries(source: &Path, dest_path: &str) -> Result<Vec<(PathBuf, String)>, UploadError> {
    let meta = std::fs::metadata(source)
        .map_err(|e| UploadError::stat(source.display().to_string(), &e))?;
    if meta.is_file() {
        return Ok(vec![(source.to_path_buf(), dest_path.to_string())]);
    }
    let mut entries = Vec::new();
    walk(source, dest_path, &mut entries)?;
    Ok(entries)
}

fn walk(
    dir: &Path,
    dest: &str,
    out: &mut Vec<(PathBuf, String)>,
) -> Result<(), UploadError> {
    let reader = std::fs::read_dir(dir)
        .map_err(|e| UploadError::stat(dir.display().to_string(), &e))?;
    let mut children: Vec<PathBuf> = reader.filter_map(|e| e.ok().map(|e| e.path())).collect();
    children.sort();
    for child in children {
        let name = child.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default();
        let child_dest = join_slash(dest, &name);
        if child.is_dir() {
            walk(&child, &child_dest, out)?;
        } else {
            out.push((child, child_dest));
        }
    }
    Ok(())
}

#[cfg(test)]
#[path = "artifacts_tests.rs"]
mod tests;
