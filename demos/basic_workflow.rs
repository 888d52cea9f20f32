// demos/basic_workflow.rs

use chrono::Utc;
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::sec1::ToEncodedPoint;
use siwe_auth::{
    crypto::ethereum::hash_personal_message, Address, AuthService, SiweConfig, SiweMessage,
    VerifyRequest,
};

fn address_of(key: &SigningKey) -> Address {
    let point = key.verifying_key().to_encoded_point(false);
    let mut xy = [0u8; 64];
    xy.copy_from_slice(&point.as_bytes()[1..]);
    Address::from_public_key_coordinates(&xy)
}

fn personal_sign(key: &SigningKey, message: &str) -> Result<String, Box<dyn std::error::Error>> {
    let digest = hash_personal_message(message.as_bytes());
    let (signature, recovery_id) = key.sign_prehash_recoverable(&digest)?;
    let mut bytes = signature.to_bytes().to_vec();
    bytes.push(recovery_id.to_byte() + 27);
    Ok(format!("0x{}", hex::encode(bytes)))
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    println!("SIWE Basic Usage Example");

    // 1. Setup verification service
    let config = SiweConfig {
        base_url: "https://example.com".to_string(),
        ..SiweConfig::default()
    };
    let auth_service = AuthService::new(config);

    // 2. Client asks for a nonce
    let issued = auth_service.issue_nonce();
    println!("Issued nonce {} for domain {}", issued.nonce, issued.domain);

    // 3. Client builds and signs the challenge (a wallet would do this)
    let wallet = SigningKey::random(&mut rand::thread_rng());
    let address = address_of(&wallet);
    let message = SiweMessage::new(
        issued.domain.clone(),
        address,
        "https://example.com",
        1,
        issued.nonce.clone(),
        Utc::now(),
    )
    .with_statement("Sign-in request for example.com.")
    .to_string();
    println!("\nChallenge text:\n{message}\n");

    let request = VerifyRequest {
        signature: personal_sign(&wallet, &message)?,
        message,
    };

    // 4. Server verifies
    match auth_service.authenticate(&request) {
        Ok(response) => {
            println!("Authentication successful!");
            println!("   Address: {}", response.address);
            println!("   Chain ID: {}", response.chain_id);
        }
        Err(e) => println!("Authentication failed ({}): {}", e.reason(), e),
    }

    // 5. Replaying the same payload is refused
    match auth_service.authenticate(&request) {
        Ok(_) => println!("Replay unexpectedly accepted"),
        Err(e) => println!("Replay rejected ({}): {}", e.reason(), e),
    }

    Ok(())
}
