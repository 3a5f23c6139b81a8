// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

#[test]
fn manifest_entry_mirrors_handle() {
    let handle = ArtifactHandle::builder()
        .kind(ArtifactKind::Video)
        .path("/work/job-1/video.mp4")
        .size_bytes(1024)
        .checksum("abcd")
        .build();

    let entry = ManifestEntry::from(&handle);
    assert_eq!(entry.artifact_id, handle.id);
    assert_eq!(entry.kind, ArtifactKind::Video);
    assert_eq!(entry.file_name, "video.mp4");
    assert_eq!(entry.size_bytes, 1024);
    assert_eq!(entry.checksum, "abcd");
}

#[test]
fn file_name_falls_back_to_id() {
    let handle = ArtifactHandle::builder().path("/").build();
    assert_eq!(handle.file_name(), handle.id.to_string());
}

#[test]
fn kind_serde_matches_wire_names() {
    let json = serde_json::to_string(&ArtifactKind::ResultData).unwrap();
    assert_eq!(json, "\"result_data\"");
    assert_eq!(ArtifactKind::ResultData.to_string(), "result-data");
}
