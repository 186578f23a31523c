//! End-to-end behavior of the router over all three ciphers.

use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use serde_json::Value;

use fieldvault::*;
use fieldvault_envelope::MasterSecret;
use fieldvault_keystore::{InMemoryAuditSink, InMemoryBackend};

const NIK: &str = "12345678901";

fn registry() -> Arc<KeyRegistry> {
    Arc::new(KeyRegistry::new(
        Arc::new(InMemoryBackend::new()),
        Arc::new(InMemoryAuditSink::new()),
        MasterSecret::generate().unwrap(),
    ))
}

fn router_with(registry: Arc<KeyRegistry>, policy: FieldPolicy) -> FieldRouter {
    FieldRouter::builder(PolicyHandle::new(policy))
        .symmetric(SymmetricCipher::new(&[0x11; 16]).unwrap())
        .registry(registry)
        .build()
}

/// Decode a JSON payload, edit it, encode it back.
fn edit_json(payload: &str, f: impl FnOnce(&mut Value)) -> String {
    let mut v: Value = serde_json::from_str(payload).unwrap();
    f(&mut v);
    v.to_string()
}

fn flip_b64_byte(encoded: &str, index: usize) -> String {
    let mut raw = STANDARD.decode(encoded).unwrap();
    raw[index] ^= 0x01;
    STANDARD.encode(raw)
}

fn is_rejected(e: &FieldError) -> bool {
    matches!(e, FieldError::Decryption(reason) if *reason == "ciphertext rejected")
}

#[test]
fn hybrid_survives_rotation_and_refuses_revoked_key() {
    let registry = registry();
    let k1 = registry.generate_keypair("pii-2024", "RSA", 1024).unwrap();
    let router = router_with(
        registry.clone(),
        FieldPolicy::default().with_write_algorithm(Algorithm::Hybrid),
    );

    let p1 = router.encrypt_for_write(NIK).unwrap();
    assert_eq!(p1.algorithm, Algorithm::Hybrid);
    assert_eq!(p1.key_ref, format!("hybrid:rsa1024:{}", k1.id));

    let k2 = registry.generate_keypair("pii-2025", "RSA", 1024).unwrap();
    assert_eq!(registry.get_key_by_id(k1.id).unwrap().status, KeyStatus::Rotated);

    let p2 = router.encrypt_for_write(NIK).unwrap();
    assert_eq!(p2.key_ref, format!("hybrid:rsa1024:{}", k2.id));

    let header: Value = serde_json::from_str(&p2.payload).unwrap();
    assert_eq!(header["v"], 1);
    assert_eq!(header["alg"], "HYBRID-RSA1024-OAEP-AES128-GCM");
    assert_eq!(header["rsa_key_id"], k2.id.get());

    for p in [&p1, &p2] {
        assert_eq!(router.decrypt_strict(Some("HYBRID"), &p.payload).unwrap(), NIK);
    }

    registry.revoke(k1.id, Some("retired")).unwrap();
    assert!(matches!(
        router.decrypt_strict(Some("HYBRID"), &p1.payload),
        Err(FieldError::KeyRevoked(id)) if id == k1.id
    ));
    assert_eq!(router.decrypt_strict(Some("HYBRID"), &p2.payload).unwrap(), NIK);
}

#[test]
fn rsa_respects_message_bound() {
    let registry = registry();
    registry.generate_keypair("short", "RSA", 1024).unwrap();
    let router = router_with(
        registry,
        FieldPolicy::default().with_write_algorithm(Algorithm::Rsa),
    );

    // 1024-bit modulus: 128 - 66 = 62 bytes.
    let fits = "x".repeat(62);
    let enc = router.encrypt_for_write(&fits).unwrap();
    assert!(enc.key_ref.starts_with("rsa1024:"));
    assert_eq!(router.decrypt_strict(Some("RSA"), &enc.payload).unwrap(), fits);

    assert!(matches!(
        router.encrypt_for_write(&"x".repeat(63)),
        Err(FieldError::Encryption(_))
    ));

    // HYBRID carries the same value without a bound.
    let long = "y".repeat(4096);
    let enc = router.encrypt_with(Algorithm::Hybrid, &long).unwrap();
    assert_eq!(router.decrypt_strict(Some("HYBRID"), &enc.payload).unwrap(), long);
}

#[test]
fn rsa_and_hybrid_need_an_active_key() {
    let registry = registry();
    let router = router_with(
        registry.clone(),
        FieldPolicy::default().with_write_algorithm(Algorithm::Hybrid),
    );
    assert!(matches!(router.encrypt_for_write(NIK), Err(FieldError::NoActiveKey)));
    assert!(matches!(router.current_key_ref(), Err(FieldError::NoActiveKey)));

    let k = registry.generate_keypair("only", "RSA", 1024).unwrap();
    registry.revoke(k.id, None).unwrap();
    assert!(matches!(
        router.encrypt_with(Algorithm::Rsa, NIK),
        Err(FieldError::NoActiveKey)
    ));
}

#[test]
fn unknown_key_id_is_key_not_found() {
    let registry = registry();
    registry.generate_keypair("k", "RSA", 1024).unwrap();
    let router = router_with(registry, FieldPolicy::default());

    for alg in [Algorithm::Rsa, Algorithm::Hybrid] {
        let enc = router.encrypt_with(alg, NIK).unwrap();
        let forged = edit_json(&enc.payload, |v| v["rsa_key_id"] = 999.into());
        assert!(matches!(
            router.decrypt_strict(Some(alg.tag()), &forged),
            Err(FieldError::KeyNotFound(id)) if id == KeyId::new(999)
        ));
    }
}

#[test]
fn tampering_is_rejected_uniformly() {
    let registry = registry();
    registry.generate_keypair("k", "RSA", 1024).unwrap();
    let router = router_with(registry, FieldPolicy::default());

    let aes = router.encrypt_with(Algorithm::Aes, NIK).unwrap();
    for index in [0, 12, 28] {
        let tampered = flip_b64_byte(&aes.payload, index);
        assert!(is_rejected(&router.decrypt_strict(Some("AES"), &tampered).unwrap_err()));
    }

    let rsa = router.encrypt_with(Algorithm::Rsa, NIK).unwrap();
    let tampered = edit_json(&rsa.payload, |v| {
        let ct = flip_b64_byte(v["ct"].as_str().unwrap(), 5);
        v["ct"] = ct.into();
    });
    assert!(is_rejected(&router.decrypt_strict(Some("RSA"), &tampered).unwrap_err()));

    let hybrid = router.encrypt_with(Algorithm::Hybrid, NIK).unwrap();
    for field in ["ek", "iv", "tag", "ct"] {
        let tampered = edit_json(&hybrid.payload, |v| {
            let flipped = flip_b64_byte(v[field].as_str().unwrap(), 0);
            v[field] = flipped.into();
        });
        let err = router.decrypt_strict(Some("HYBRID"), &tampered).unwrap_err();
        assert!(is_rejected(&err), "{field}: {err}");
    }
}

#[test]
fn structural_problems_are_named() {
    let registry = registry();
    registry.generate_keypair("k", "RSA", 1024).unwrap();
    let router = router_with(registry, FieldPolicy::default());
    let hybrid = router.encrypt_with(Algorithm::Hybrid, NIK).unwrap();

    let missing = edit_json(&hybrid.payload, |v| {
        v.as_object_mut().unwrap().remove("ek");
    });
    assert!(matches!(
        router.decrypt_strict(Some("HYBRID"), &missing),
        Err(FieldError::Decryption("missing field `ek`"))
    ));

    assert!(matches!(
        router.decrypt_strict(Some("HYBRID"), "not json"),
        Err(FieldError::Decryption(_))
    ));

    // A symmetric payload handed to the RSA path.
    let aes = router.encrypt_with(Algorithm::Aes, NIK).unwrap();
    assert!(matches!(
        router.decrypt_strict(Some("RSA"), &aes.payload),
        Err(FieldError::Decryption(_))
    ));
}

#[test]
fn tags_resolve_decryptor() {
    let router = router_with(registry(), FieldPolicy::default());
    let aes = router.encrypt_for_write(NIK).unwrap();

    assert_eq!(router.decrypt_strict(None, &aes.payload).unwrap(), NIK);
    assert_eq!(router.decrypt_strict(Some("aes"), &aes.payload).unwrap(), NIK);
    assert!(matches!(
        router.decrypt_strict(Some("DES"), &aes.payload),
        Err(FieldError::UnsupportedAlgorithm(tag)) if tag == "DES"
    ));
    assert_eq!(router.decrypt_safe(Some("DES"), &aes.payload), None);
}

#[test]
fn staged_migration_of_a_pii_column() {
    let registry = registry();
    registry.generate_keypair("pii", "RSA", 1024).unwrap();
    let policy = PolicyHandle::new(FieldPolicy::default().with_write_algorithm(Algorithm::Hybrid));
    let router = FieldRouter::builder(policy.clone())
        .registry(registry.clone())
        .build();

    // Legacy rows hold plaintext only.
    let mut rows: Vec<FieldRow> = (1..=3)
        .map(|id| FieldRow::new(id, EncryptedField::legacy(format!("3174{id:012}"))))
        .collect();

    // Transition: backfill ciphertext, mirror stays authoritative.
    let report = encrypt_legacy(&router, FieldGroup::Pii, &mut rows);
    assert_eq!(report.migrated, 3);
    let storage = FieldStorage::new(&router, FieldGroup::Pii);
    for row in &rows {
        assert_eq!(storage.read(&row.field).unwrap(), row.field.plaintext);
    }

    // Flip to cipher-only: the mirror is ignored even when stale.
    policy.update(|p| p.with_mode(FieldGroup::Pii, StorageMode::CipherOnly));
    rows[0].field.plaintext = Some("stale".into());
    assert_eq!(
        storage.read(&rows[0].field).unwrap().as_deref(),
        Some("3174000000000001")
    );

    // Rotate and re-key every row.
    let k2 = registry.generate_keypair("pii-next", "RSA", 1024).unwrap();
    let report = reencrypt(&router, &mut rows);
    assert_eq!(report.migrated, 3);
    assert!(report.is_clean());
    for row in &rows {
        assert_eq!(row.field.key_ref, Some(format!("hybrid:rsa1024:{}", k2.id)));
        assert!(storage.read(&row.field).unwrap().is_some());
    }

    // Nothing left to re-key.
    assert_eq!(reencrypt(&router, &mut rows).skipped, 3);
}

#[test]
fn safe_read_never_fails() {
    let policy = FieldPolicy::default().with_mode(FieldGroup::Salary, StorageMode::CipherOnly);
    let router = router_with(registry(), policy);
    let storage = FieldStorage::new(&router, FieldGroup::Salary);

    let broken = EncryptedField {
        ciphertext: Some("{\"v\":1}".into()),
        algorithm: Some(Algorithm::Hybrid),
        ..EncryptedField::default()
    };
    assert!(storage.read(&broken).is_err());
    assert_eq!(storage.read_safe(&broken), None);
}
