mod common;

use std::fs;

use common::{PASSWORD, jpeg_bytes};
use pixrecover::validate;
use tempfile::tempdir;

#[test]
fn legacy_encrypt_decrypt_roundtrip() {
    // 旧版构造是对称的 CTR：同一口令加密再解密必须得到原文。
    let plaintext = jpeg_bytes(0x5a);
    let ciphertext = pixrecover::encrypt_legacy(PASSWORD, &plaintext);

    assert_ne!(ciphertext, plaintext);
    assert_eq!(pixrecover::decrypt_legacy(PASSWORD, &ciphertext), plaintext);
}

#[test]
fn same_password_gives_same_keystream() {
    // 固定 IV：相同口令与明文总是得到相同密文。
    let plaintext = b"deterministic";
    assert_eq!(
        pixrecover::encrypt_legacy("pw", plaintext),
        pixrecover::encrypt_legacy("pw", plaintext)
    );
    assert_ne!(
        pixrecover::encrypt_legacy("pw", plaintext),
        pixrecover::encrypt_legacy("pw2", plaintext)
    );
}

#[test]
fn password_probe_on_sample_file() {
    let temp_dir = tempdir().expect("create temp dir");
    let sample = temp_dir.path().join("sample.6zu");
    fs::write(&sample, pixrecover::encrypt_legacy(PASSWORD, &jpeg_bytes(1))).expect("write sample");

    assert!(validate::probe_file(PASSWORD, &sample).expect("probe"));
    assert!(!validate::probe_file("rossz_jelszo", &sample).expect("probe"));
}

#[test]
fn container_seal_open_roundtrip() {
    let inner = b"PK\x05\x06 not really a zip, the cipher does not care";
    let sealed = pixrecover::seal_container(inner, PASSWORD, pixrecover::ContainerFormat::V1)
        .expect("seal container");

    let (format, opened) = pixrecover::open_container(&sealed, PASSWORD).expect("open container");
    assert_eq!(format, pixrecover::ContainerFormat::V1);
    assert_eq!(opened, inner);
}
