// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Artifact upload specs: destination layout, glob expansion, checksums,
//! and the failure path.

use stoker_protocol::BuildCommand;
use stoker_session::test_support::{trim_timestamps, MockServer};

use super::support::{content_md5, create_test_project, report_result, run_build};

fn wd_string(dir: &tempfile::TempDir) -> String {
    dir.path().to_string_lossy().into_owned()
}

#[tokio::test]
async fn missing_artifact_fails_the_build() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    let wd = wd_string(&dir);

    let messages = run_build(
        &server,
        vec![
            BuildCommand::upload_artifact("nofile", "").setwd(wd.clone()),
            BuildCommand::report_completed(),
        ],
    )
    .await;

    assert_eq!(report_result(&messages, "reportCompleted").as_deref(), Some("Failed"));
    let log = trim_timestamps(&server.text_for("/console/b1"));
    assert_eq!(log, format!("stat {wd}/nofile: no such file or directory\n"));
}

#[tokio::test]
async fn uploads_a_whole_directory_to_the_default_root() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    create_test_project(dir.path());
    let wd = wd_string(&dir);

    run_build(&server, vec![BuildCommand::upload_artifact("src", "").setwd(wd.clone())]).await;

    let log = trim_timestamps(&server.text_for("/console/b1"));
    assert_eq!(log, format!("Uploading artifacts from {wd}/src to [defaultRoot]\n"));

    let md5 = content_md5();
    assert_eq!(
        server.checksum_lines(),
        vec![
            format!("src/1.txt={md5}"),
            format!("src/2.txt={md5}"),
            format!("src/hello/3.txt={md5}"),
            format!("src/hello/4.txt={md5}"),
        ]
    );
}

#[tokio::test]
async fn uploads_a_directory_under_a_dest_dir() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    create_test_project(dir.path());
    let wd = wd_string(&dir);

    run_build(&server, vec![BuildCommand::upload_artifact("src/hello", "dest").setwd(wd.clone())]).await;

    let log = trim_timestamps(&server.text_for("/console/b1"));
    assert_eq!(log, format!("Uploading artifacts from {wd}/src/hello to dest\n"));

    let md5 = content_md5();
    assert_eq!(
        server.checksum_lines(),
        vec![format!("dest/hello/3.txt={md5}"), format!("dest/hello/4.txt={md5}")]
    );
}

#[tokio::test]
async fn uploads_a_single_file_into_a_dest_dir() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    create_test_project(dir.path());
    let wd = wd_string(&dir);

    run_build(
        &server,
        vec![BuildCommand::upload_artifact("src/hello/4.txt", "dest/subdir").setwd(wd.clone())],
    )
    .await;

    let log = trim_timestamps(&server.text_for("/console/b1"));
    assert_eq!(log, format!("Uploading artifacts from {wd}/src/hello/4.txt to dest/subdir\n"));
    assert_eq!(server.checksum_lines(), vec![format!("dest/subdir/4.txt={}", content_md5())]);
}

#[tokio::test]
async fn glob_matches_keep_their_directory_under_the_dest() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    create_test_project(dir.path());
    let wd = wd_string(&dir);

    run_build(&server, vec![BuildCommand::upload_artifact("src/hello/*.txt", "dest").setwd(wd.clone())])
        .await;

    let log = trim_timestamps(&server.text_for("/console/b1"));
    assert_eq!(
        log,
        format!(
            "Uploading artifacts from {wd}/src/hello/3.txt to dest/hello\n\
             Uploading artifacts from {wd}/src/hello/4.txt to dest/hello\n"
        )
    );

    let md5 = content_md5();
    assert_eq!(
        server.checksum_lines(),
        vec![format!("dest/hello/3.txt={md5}"), format!("dest/hello/4.txt={md5}")]
    );
}

#[tokio::test]
async fn recursive_glob_reproduces_the_matched_path() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    create_test_project(dir.path());
    let wd = wd_string(&dir);

    run_build(&server, vec![BuildCommand::upload_artifact("src/**/3.txt", "dest").setwd(wd.clone())])
        .await;

    assert_eq!(
        server.checksum_lines(),
        vec![format!("dest/src/hello/3.txt={}", content_md5())]
    );
}

#[tokio::test]
async fn glob_with_a_partial_component_matches_sibling_directories() {
    let server = MockServer::start().await;
    let dir = tempfile::tempdir().unwrap();
    create_test_project(dir.path());
    let wd = wd_string(&dir);

    run_build(&server, vec![BuildCommand::upload_artifact("test/w*/10.txt", "dest").setwd(wd.clone())])
        .await;

    let md5 = content_md5();
    assert_eq!(
        server.checksum_lines(),
        vec![
            format!("dest/test/world/10.txt={md5}"),
            format!("dest/test/world2/10.txt={md5}"),
        ]
    );
}
