use chrono::{Duration, Utc};
use siwe_auth::{
    clock::{Clock, ManualClock},
    crypto::ethereum::hash_personal_message,
    Address, AuthError, AuthService, NonceStore, ParseError, RejectionReason, SiweConfig,
    SiweMessage, VerifyRequest,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Store that hands out a predetermined token, the way a host-backed store might
struct ScriptedNonceStore {
    next: String,
    used: Mutex<HashMap<String, bool>>,
}

impl ScriptedNonceStore {
    fn new(next: &str) -> Self {
        Self {
            next: next.to_string(),
            used: Mutex::new(HashMap::new()),
        }
    }
}

impl NonceStore for ScriptedNonceStore {
    fn issue(&self) -> String {
        self.used.lock().unwrap().insert(self.next.clone(), false);
        self.next.clone()
    }

    fn is_valid(&self, token: &str) -> bool {
        self.used.lock().unwrap().get(token) == Some(&false)
    }

    fn try_consume(&self, token: &str) -> bool {
        let mut used = self.used.lock().unwrap();
        match used.get_mut(token) {
            Some(flag) if !*flag => {
                *flag = true;
                true
            }
            _ => false,
        }
    }
}

struct Wallet {
    secret: libsecp256k1::SecretKey,
}

impl Wallet {
    fn new(seed: u8) -> Self {
        Self {
            secret: libsecp256k1::SecretKey::parse(&[seed; 32]).unwrap(),
        }
    }

    fn address(&self) -> Address {
        let public = libsecp256k1::PublicKey::from_secret_key(&self.secret).serialize();
        let mut xy = [0u8; 64];
        xy.copy_from_slice(&public[1..]);
        Address::from_public_key_coordinates(&xy)
    }

    fn personal_sign(&self, message: &str) -> String {
        let digest = hash_personal_message(message.as_bytes());
        let (signature, recovery_id) =
            libsecp256k1::sign(&libsecp256k1::Message::parse(&digest), &self.secret);
        let mut bytes = signature.serialize().to_vec();
        bytes.push(recovery_id.serialize() + 27);
        format!("0x{}", hex::encode(bytes))
    }
}

fn config() -> SiweConfig {
    SiweConfig {
        base_url: "https://example.com/".to_string(),
        ..SiweConfig::default()
    }
}

fn challenge(domain: &str, wallet: &Wallet, nonce: &str, clock: &dyn Clock) -> String {
    SiweMessage::new(domain, wallet.address(), "https://example.com", 1, nonce, clock.now())
        .with_statement("Sign-in request for example.com.")
        .to_string()
}

#[test]
fn test_sign_in_then_replay() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = AuthService::with_store(
        config(),
        ScriptedNonceStore::new("abcdEFGH12345678"),
        clock.clone(),
    );
    let wallet = Wallet::new(0x11);

    let issued = service.issue_nonce();
    assert_eq!(issued.nonce, "abcdEFGH12345678");
    assert_eq!(issued.domain, "example.com");

    let message = challenge(&issued.domain, &wallet, &issued.nonce, clock.as_ref());
    let request = VerifyRequest {
        signature: wallet.personal_sign(&message),
        message,
    };

    let response = service.authenticate(&request).unwrap();
    assert_eq!(response.address, wallet.address());

    let replay = service.authenticate(&request).unwrap_err();
    assert_eq!(replay, AuthError::NonceInvalid);
    assert_eq!(replay.reason(), RejectionReason::Nonce);
}

#[test]
fn test_resigned_message_cannot_reuse_nonce() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = AuthService::with_clock(config(), clock.clone());
    let wallet = Wallet::new(0x22);

    let nonce = service.issue_nonce().nonce;
    let first = challenge("example.com", &wallet, &nonce, clock.as_ref());
    service
        .verify(&first, &wallet.personal_sign(&first), "example.com")
        .unwrap();

    clock.advance(Duration::seconds(5));
    let second = challenge("example.com", &wallet, &nonce, clock.as_ref());
    assert_ne!(first, second);
    assert_eq!(
        service.verify(&second, &wallet.personal_sign(&second), "example.com"),
        Err(AuthError::NonceInvalid)
    );
}

#[test]
fn test_forged_request_does_not_burn_nonce() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = AuthService::with_clock(config(), clock.clone());
    let victim = Wallet::new(0x33);
    let attacker = Wallet::new(0x44);

    let nonce = service.issue_nonce().nonce;
    let message = challenge("example.com", &victim, &nonce, clock.as_ref());

    let forged = service.verify(&message, &attacker.personal_sign(&message), "example.com");
    assert_eq!(forged.unwrap_err().reason(), RejectionReason::AddressMismatch);

    let genuine = service.verify(&message, &victim.personal_sign(&message), "example.com");
    assert_eq!(genuine, Ok(victim.address()));
}

#[test]
fn test_domain_binding() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = AuthService::with_clock(config(), clock.clone());
    let wallet = Wallet::new(0x55);

    let nonce = service.issue_nonce().nonce;
    let message = challenge("evil.example", &wallet, &nonce, clock.as_ref());
    let result = service.verify(&message, &wallet.personal_sign(&message), "site.example");
    assert_eq!(result.unwrap_err().reason(), RejectionReason::Domain);
}

#[test]
fn test_stale_issued_at() {
    let clock = Arc::new(ManualClock::new(Utc::now()));
    let service = AuthService::with_clock(config(), clock.clone());
    let wallet = Wallet::new(0x66);

    let nonce = service.issue_nonce().nonce;
    let old = SiweMessage::new(
        "example.com",
        wallet.address(),
        "https://example.com",
        1,
        nonce.as_str(),
        clock.now() - Duration::hours(25),
    )
    .to_string();

    assert_eq!(
        service.verify(&old, &wallet.personal_sign(&old), "example.com"),
        Err(AuthError::Malformed(ParseError::Stale))
    );
}

#[test]
fn test_concurrent_duplicate_submissions() {
    let service = Arc::new(AuthService::new(config()));
    let wallet = Wallet::new(0x77);
    let nonce = service.issue_nonce().nonce;
    let message = SiweMessage::new(
        "example.com",
        wallet.address(),
        "https://example.com",
        1,
        nonce.as_str(),
        Utc::now(),
    )
    .to_string();
    let request = VerifyRequest {
        signature: wallet.personal_sign(&message),
        message,
    };

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let service = service.clone();
            let request = request.clone();
            std::thread::spawn(move || service.authenticate(&request).is_ok())
        })
        .collect();
    let accepted = handles
        .into_iter()
        .map(|h| h.join().unwrap())
        .filter(|ok| *ok)
        .count();

    assert_eq!(accepted, 1);
}

#[test]
fn test_request_deserializes_from_json() {
    let request: VerifyRequest =
        serde_json::from_str(r#"{ "message": "m", "signature": "0x" }"#).unwrap();
    assert_eq!(request.message, "m");
    assert_eq!(request.signature, "0x");
}
