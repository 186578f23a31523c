#![no_main]

use std::sync::Arc;

use fieldvault::{FieldRouter, KeyRegistry, PolicyHandle, SymmetricCipher};
use fieldvault_envelope::MasterSecret;
use libfuzzer_sys::fuzz_target;
use once_cell::sync::Lazy;

static ROUTER: Lazy<FieldRouter> = Lazy::new(|| {
    let registry = Arc::new(KeyRegistry::in_memory(MasterSecret::generate().unwrap()));
    registry.generate_keypair("fuzz", "RSA", 1024).unwrap();
    FieldRouter::builder(PolicyHandle::default())
        .symmetric(SymmetricCipher::new(&[0x42; 16]).unwrap())
        .registry(registry)
        .build()
});

const TAGS: &[Option<&str>] = &[None, Some("AES"), Some("RSA"), Some("HYBRID"), Some("DES")];

fuzz_target!(|data: &[u8]| {
    if data.is_empty() {
        return;
    }
    let tag = TAGS[data[0] as usize % TAGS.len()];
    let Ok(payload) = std::str::from_utf8(&data[1..]) else {
        return;
    };

    // Any input: errors are fine, panics are not.
    let _ = ROUTER.decrypt_strict(tag, payload);
    let _ = ROUTER.decrypt_safe(tag, payload);
});
