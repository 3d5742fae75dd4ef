//! Latency assertions for the hot codec paths.
//!
//! For any Security Event Token built or parsed locally (no network I/O),
//! the operation should complete well under a millisecond at p99.

use ssf_client::builder::SetBuilder;
use ssf_client::event::{Event, SessionRevoked};
use ssf_client::jwt::{Rs256Signer, Signer};
use ssf_client::parser::Parser;
use ssf_client::subject::Subject;
use std::time::{Duration, Instant};

const SAMPLE_SIZE: usize = 100;

fn calculate_p99(latencies: &[Duration]) -> Duration {
    let p99_index = (latencies.len() as f64 * 0.99) as usize - 1;
    latencies[p99_index]
}

fn builder_for(i: usize) -> SetBuilder {
    SetBuilder::new()
        .issuer("https://issuer.example")
        .subject(Subject::Email { email: format!("user-{i}@example.com") })
        .event(Event::SessionRevoked(SessionRevoked::default()))
}

#[test]
fn build_unsigned_latency_slo() {
    let mut latencies = Vec::with_capacity(SAMPLE_SIZE);
    for i in 0..SAMPLE_SIZE {
        let builder = builder_for(i);
        let start = Instant::now();
        let _token = builder.build_unsigned().unwrap();
        latencies.push(start.elapsed());
    }
    latencies.sort_unstable();
    let p99 = calculate_p99(&latencies);

    println!("build_unsigned p99: {p99:?}");
    assert!(p99.as_millis() < 5, "build_unsigned p99 ({p99:?}) should be < 5ms");
}

#[test]
fn parse_no_verify_latency_slo() {
    let parser = Parser::new();
    let tokens: Vec<String> = (0..SAMPLE_SIZE).map(|i| builder_for(i).build_unsigned().unwrap()).collect();

    let mut latencies = Vec::with_capacity(SAMPLE_SIZE);
    for token in &tokens {
        let start = Instant::now();
        let _set = parser.parse_no_verify(token).unwrap();
        latencies.push(start.elapsed());
    }
    latencies.sort_unstable();
    let p99 = calculate_p99(&latencies);

    println!("parse_no_verify p99: {p99:?}");
    assert!(p99.as_millis() < 5, "parse_no_verify p99 ({p99:?}) should be < 5ms");
}

#[test]
fn rs256_sign_latency_slo() {
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};
    use rsa::RsaPrivateKey;

    let private = RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
    let private_pem = private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
    let signer = Rs256Signer::from_pem(private_pem.as_bytes()).unwrap();

    let mut latencies = Vec::with_capacity(SAMPLE_SIZE);
    for _ in 0..SAMPLE_SIZE {
        let start = Instant::now();
        let _sig = signer.sign(b"header.payload").unwrap();
        latencies.push(start.elapsed());
    }
    latencies.sort_unstable();
    let p99 = calculate_p99(&latencies);

    println!("rs256 sign p99: {p99:?}");
    assert!(p99.as_millis() < 20, "RS256 sign p99 ({p99:?}) should be < 20ms");
}
