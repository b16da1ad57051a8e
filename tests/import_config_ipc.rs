mod test_support;

use serde_json::json;
use test_support::{error_code, request, request_ok, spawn_sidecar, temp_dir};

#[test]
fn import_config_defaults_update_and_persist() {
    let workspace = temp_dir("pesertad-import-config");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    let got = request_ok(&mut stdin, &mut reader, "2", "import.config.get", json!({}));
    assert_eq!(
        got["config"],
        json!({
            "headerScanRows": 5,
            "defaultHeaderRow": 1,
            "fallbackPelatihanCol": 3,
            "fallbackUjikomCol": 4,
            "archiveUploads": true
        })
    );

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "import.config.update",
        json!({ "patch": { "headerScanRows": 8, "fallbackUjikomCol": null } }),
    );
    assert_eq!(updated["config"]["headerScanRows"], 8);
    assert!(updated["config"]["fallbackUjikomCol"].is_null());
    assert_eq!(updated["config"]["fallbackPelatihanCol"], 3);

    drop(stdin);
    let _ = child.wait();

    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
    let got = request_ok(&mut stdin, &mut reader, "2", "import.config.get", json!({}));
    assert_eq!(got["config"]["headerScanRows"], 8);
    assert!(got["config"]["fallbackUjikomCol"].is_null());
}

#[test]
fn import_config_rejects_bad_patches() {
    let workspace = temp_dir("pesertad-import-config-bad");
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );

    for (i, patch) in [
        json!({ "headerScanRows": 0 }),
        json!({ "headerScanRows": 21 }),
        json!({ "defaultHeaderRow": -1 }),
        json!({ "archiveUploads": "yes" }),
        json!({ "sheetIndex": 2 }),
    ]
    .into_iter()
    .enumerate()
    {
        let resp = request(
            &mut stdin,
            &mut reader,
            &format!("bad-{i}"),
            "import.config.update",
            json!({ "patch": patch }),
        );
        assert_eq!(error_code(&resp), "bad_params", "patch {i}");
    }
    let resp = request(
        &mut stdin,
        &mut reader,
        "2",
        "import.config.update",
        json!({ "patch": [1, 2] }),
    );
    assert_eq!(error_code(&resp), "bad_params");

    let got = request_ok(&mut stdin, &mut reader, "3", "import.config.get", json!({}));
    assert_eq!(got["config"]["headerScanRows"], 5);
}
