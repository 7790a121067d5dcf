use meshcore_keygen::{derive_from_seed, KeyFile};
use std::path::Path;

// RFC 8032 section 7.1, TEST 1
const RFC_SEED: &str = "9d61b19deffd5a60ba844af492ec2cc44449c5697b326919703bac031cae7f60";
const RFC_PUBLIC: &str = "D75A980182B10AB7D54BFED3C964073A0EE172F3DAA62325AF021A68F707511A";

fn verify_known_vector() -> bool {
    let mut seed = [0u8; 32];
    if hex::decode_to_slice(RFC_SEED, &mut seed).is_err() {
        return false;
    }
    let generated = derive_from_seed(&seed).public_key_hex();

    println!("Seed:      {}", RFC_SEED);
    println!("Expected:  {}", RFC_PUBLIC);
    println!("Generated: {}", generated);

    let matches = generated == RFC_PUBLIC;
    println!("Match: {}\n", if matches { "✓ YES" } else { "✗ NO" });
    matches
}

fn verify_key_file(path: &Path) -> bool {
    println!("Key file: {}", path.display());
    let result = KeyFile::read_from(path).and_then(|file| {
        println!("Prefix:     {}", file.prefix);
        println!("Public Key: {}", file.public_key);
        let pair = file.key_pair()?;
        let prefix_ok = pair.public_key_hex().starts_with(&file.prefix.to_uppercase());
        Ok(prefix_ok)
    });

    match result {
        Ok(true) => {
            println!("Keypair consistent, prefix matches: ✓ YES\n");
            true
        }
        Ok(false) => {
            println!("Keypair consistent, prefix matches: ✗ NO\n");
            false
        }
        Err(e) => {
            println!("Verification failed: {}\n", e);
            false
        }
    }
}

fn main() {
    println!("=== Verifying Key Derivation ===\n");

    let mut ok = verify_known_vector();
    for arg in std::env::args().skip(1) {
        ok &= verify_key_file(Path::new(&arg));
    }

    if ok {
        println!("✓ All checks passed!");
    } else {
        println!("✗ Verification failed!");
        std::process::exit(1);
    }
}
