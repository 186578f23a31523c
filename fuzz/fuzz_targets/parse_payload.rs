#![no_main]

use fieldvault::payload::Payload;
use fieldvault::Algorithm;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    for alg in [Algorithm::Aes, Algorithm::Rsa, Algorithm::Hybrid] {
        if let Ok(payload) = Payload::parse(alg, text) {
            assert_eq!(payload.algorithm(), alg);
        }
    }
});
