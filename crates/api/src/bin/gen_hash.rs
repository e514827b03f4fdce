//! Prints an Argon2id hash for a password given on the command line. Useful
//! for seeding `MITSUME_ADMIN_PASSWORD`-less fixtures by hand.

fn main() {
    let password = std::env::args().nth(1).unwrap_or_else(|| {
        eprintln!("usage: gen_hash <password>");
        std::process::exit(1);
    });

    match mitsume_auth::hash_password(&password) {
        Ok(hash) => println!("{}", hash),
        Err(e) => {
            eprintln!("failed to hash password: {}", e);
            std::process::exit(1);
        }
    }
}
