use argon2::{Argon2, PasswordHasher};
use argon2::password_hash::{SaltString, rand_core::OsRng};

// Prints the PHC string to put in ADMIN_SENHA_HASH.
fn main() {
    let password = std::env::args().nth(1).expect("Usage: hashpass <senha>");
    let salt = SaltString::generate(&mut OsRng);
    let phc = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .unwrap()
        .to_string();
    println!("{phc}");
}
