//! Tests upload validation limits and pending-upload derivation.

use doclens_core::{
    FileKind, MAX_UPLOAD_BYTES, PendingUpload, UploadFile, ValidationError, file_fingerprint,
    validate_upload,
};

#[test]
fn upload_validation_tests_accept_file_at_size_limit() {
    let file = UploadFile::new(
        "limit.pdf",
        "application/pdf",
        vec![0; MAX_UPLOAD_BYTES as usize],
    );
    assert_eq!(validate_upload(&file), Ok(FileKind::Pdf));
}

#[test]
fn upload_validation_tests_reject_file_over_size_limit() {
    let file = UploadFile::new(
        "big.txt",
        "text/plain",
        vec![b'a'; MAX_UPLOAD_BYTES as usize + 1],
    );
    assert_eq!(
        validate_upload(&file),
        Err(ValidationError::TooLarge {
            size: MAX_UPLOAD_BYTES + 1,
            limit: MAX_UPLOAD_BYTES,
        })
    );
}

#[test]
fn upload_validation_tests_reject_disallowed_types() {
    for mime in ["application/zip", "text/html", "video/mp4", ""] {
        let file = UploadFile::new("blob", mime, vec![1]);
        assert!(
            matches!(
                validate_upload(&file),
                Err(ValidationError::UnsupportedType(_))
            ),
            "{mime:?} should be rejected"
        );
    }
}

#[test]
fn upload_validation_tests_fingerprint_is_stable_sha256() {
    let pending = PendingUpload::new(UploadFile::new("note.txt", "text/plain", b"abc".to_vec()))
        .expect("text file should be accepted");
    assert_eq!(
        pending.fingerprint,
        "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
    );
    assert_eq!(pending.fingerprint, file_fingerprint(b"abc"));
    assert_eq!(pending.kind, FileKind::Text);
}
