use std::io::{self, BufRead, Write};

use clap::Parser;

/// Generate a bcrypt hash for the mock IdP's ADMIN_PASSWORD_HASH.
///
/// The password is read from the first line of stdin, so it never lands in
/// shell history:
///
///   hash-gen            (prompts)
///   echo -n s3cret | hash-gen --quiet
#[derive(Parser, Debug)]
#[command(name = "hash-gen", version, about)]
struct Args {
    /// bcrypt cost factor (4..=31)
    #[arg(long, default_value_t = bcrypt::DEFAULT_COST)]
    cost: u32,

    /// Print only the hash (no prompt, no label)
    #[arg(long, default_value_t = false)]
    quiet: bool,
}

fn read_password(prompt: bool) -> io::Result<String> {
    if prompt {
        eprint!("Enter a password: ");
        io::stderr().flush()?;
    }

    let mut line = String::new();
    io::stdin().lock().read_line(&mut line)?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let password = read_password(!args.quiet)?;
    if password.is_empty() {
        return Err("empty password".into());
    }

    let hash = bcrypt::hash(password, args.cost)?;

    if args.quiet {
        println!("{}", hash);
    } else {
        println!("Hash: {}", hash);
        println!("ADMIN_PASSWORD_HASH='{}'", hash);
    }

    Ok(())
}
