//! Decrypt timing: valid vs rejected inputs per cipher.
//!
//! Run with: `cargo bench --bench timing`
//!
//! Rejected paths should cost about the same as each other. A large gap
//! between "tampered" and "wrong_key" would hint at an oracle.

use std::hint::black_box;
use std::sync::Arc;
use std::time::Instant;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;

use fieldvault::{Algorithm, FieldRouter, KeyRegistry, PolicyHandle, SymmetricCipher};
use fieldvault_envelope::MasterSecret;

fn time_it<F: FnMut()>(label: &str, iters: usize, mut f: F) {
    // warmup
    for _ in 0..(iters / 10).max(10) {
        f();
    }

    let start = Instant::now();
    for _ in 0..iters {
        f();
    }
    let elapsed = start.elapsed();

    let per_iter = elapsed / (iters as u32);
    println!("{:<24} total={:?}  per_iter={:?}", label, elapsed, per_iter);
}

fn router(aes_key: u8, registry: Arc<KeyRegistry>) -> FieldRouter {
    FieldRouter::builder(PolicyHandle::default())
        .symmetric(SymmetricCipher::new(&[aes_key; 16]).unwrap())
        .registry(registry)
        .build()
}

fn flip_last_byte(payload: &str) -> String {
    let mut raw = STANDARD.decode(payload).unwrap();
    let last = raw.len() - 1;
    raw[last] ^= 0x01;
    STANDARD.encode(raw)
}

fn main() {
    let registry = Arc::new(KeyRegistry::in_memory(MasterSecret::generate().unwrap()));
    registry.generate_keypair("bench", "RSA", 2048).unwrap();

    let good = router(0x42, registry.clone());
    let other = router(0x43, registry);

    let value = "3174011203980001";

    // AES
    let aes = good.encrypt_with(Algorithm::Aes, value).unwrap().payload;
    let aes_tampered = flip_last_byte(&aes);
    let iters = 50_000;

    time_it("aes/valid", iters, || {
        black_box(good.decrypt_strict(Some("AES"), black_box(&aes)).unwrap());
    });
    time_it("aes/tampered", iters, || {
        black_box(good.decrypt_strict(Some("AES"), black_box(&aes_tampered)).err());
    });
    time_it("aes/wrong_key", iters, || {
        black_box(other.decrypt_strict(Some("AES"), black_box(&aes)).err());
    });

    // HYBRID: private-key operations dominate.
    let hybrid = good.encrypt_with(Algorithm::Hybrid, value).unwrap().payload;
    let mut doc: serde_json::Value = serde_json::from_str(&hybrid).unwrap();
    let ct = flip_last_byte(doc["ct"].as_str().unwrap_or_default());
    doc["ct"] = ct.into();
    let hybrid_tampered = doc.to_string();
    let iters = 500;

    time_it("hybrid/valid", iters, || {
        black_box(good.decrypt_strict(Some("HYBRID"), black_box(&hybrid)).unwrap());
    });
    time_it("hybrid/tampered_body", iters, || {
        black_box(good.decrypt_strict(Some("HYBRID"), black_box(&hybrid_tampered)).err());
    });
}
