use std::fs::{self, File};
use std::io::BufReader;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;
use tracing_subscriber::EnvFilter;

use ota_sign::keys::{self, KEY_BITS};
use ota_sign::{
    ImageVerifier, RsaImageSigner, SigningReport, VerificationReport, VerifiedImage, digest,
    digest_reader, hex_dump,
};

#[derive(Parser)]
#[command(name = "ota-sign", version, about = "Sign and verify OTA firmware images")]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Generate a new RSA key pair for image signing.
    ///
    /// Images signed with any previous key will no longer verify against
    /// the new public key. Existing key files are never overwritten.
    Keygen {
        /// Output path for the private key (PKCS#1 PEM, mode 0600).
        #[arg(long)]
        private_key: PathBuf,
        /// Output path for the public key (SubjectPublicKeyInfo PEM).
        #[arg(long)]
        public_key: PathBuf,
    },

    /// Append a signature to a firmware image.
    Sign {
        /// Private key PEM file.
        #[arg(long, env = "OTA_SIGNING_KEY")]
        key: PathBuf,
        /// Raw firmware image.
        #[arg(long)]
        input: PathBuf,
        /// Where to write the signed image.
        #[arg(long)]
        output: PathBuf,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Check a signed image against a trusted public key.
    Verify {
        /// Public key PEM file.
        #[arg(long, env = "OTA_VERIFYING_KEY")]
        public_key: PathBuf,
        /// Signed image.
        #[arg(long)]
        input: PathBuf,
        /// Write the verified payload here. Nothing is written on failure.
        #[arg(long)]
        output: Option<PathBuf>,
        /// Print the report as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print the SHA-256 digest of a file.
    Digest {
        #[arg(long)]
        input: PathBuf,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    match args.command {
        Command::Keygen {
            private_key,
            public_key,
        } => keygen(&private_key, &public_key),
        Command::Sign {
            key,
            input,
            output,
            json,
        } => sign(&key, &input, &output, json),
        Command::Verify {
            public_key,
            input,
            output,
            json,
        } => verify(&public_key, &input, output.as_deref(), json),
        Command::Digest { input } => {
            let file = File::open(&input).with_context(|| format!("opening {}", input.display()))?;
            let digest = digest_reader(BufReader::new(file))
                .with_context(|| format!("reading {}", input.display()))?;
            println!("{}", hex_dump(&digest));
            Ok(())
        }
    }
}

fn keygen(private_key: &Path, public_key: &Path) -> Result<()> {
    info!(bits = KEY_BITS, "generating RSA key pair");
    let pair = keys::generate_key_pair(KEY_BITS).context("generating key pair")?;
    pair.save(private_key, public_key)
        .context("saving key pair (remove existing key files first)")?;

    println!("private key: {}", private_key.display());
    println!("public key:  {}", public_key.display());
    println!("fingerprint: {}", keys::fingerprint(pair.public_key())?);
    println!();
    println!("Keep the private key on the signing host. Provision only the public key to devices.");
    Ok(())
}

fn sign(key: &Path, input: &Path, output: &Path, json: bool) -> Result<()> {
    let signer = RsaImageSigner::from_pem_file(key)
        .with_context(|| format!("loading signing key {}", key.display()))?;
    let raw = fs::read(input).with_context(|| format!("reading {}", input.display()))?;

    info!(input = %input.display(), len = raw.len(), "signing image");
    let image = signer
        .sign(&raw)
        .with_context(|| format!("signing {}", input.display()))?;
    let report = SigningReport::new(input, output, &image, &signer)?;

    fs::write(output, image.as_bytes())
        .with_context(|| format!("writing {}", output.display()))?;
    info!(output = %output.display(), len = image.len(), "signed image written");

    print_report(&report, json)
}

fn verify(public_key: &Path, input: &Path, output: Option<&Path>, json: bool) -> Result<()> {
    let verifier = ImageVerifier::from_pem_file(public_key)
        .with_context(|| format!("loading public key {}", public_key.display()))?;
    let fingerprint = verifier.fingerprint()?;
    let rejected = || format!("rejecting {}", input.display());

    let report = match output {
        Some(output) => {
            let signed = fs::read(input).with_context(|| format!("reading {}", input.display()))?;
            let payload = verifier.verify(&signed).with_context(rejected)?;
            let verified = VerifiedImage {
                payload_len: payload.len() as u64,
                digest: digest(payload),
            };
            fs::write(output, payload).with_context(|| format!("writing {}", output.display()))?;
            VerificationReport::new(input, &verified, fingerprint).with_payload_output(output)
        }
        None => {
            let file = File::open(input).with_context(|| format!("opening {}", input.display()))?;
            let verified = verifier
                .verify_reader(BufReader::new(file))
                .with_context(rejected)?;
            VerificationReport::new(input, &verified, fingerprint)
        }
    };
    info!(input = %input.display(), payload_len = report.payload_len, "image accepted");

    print_report(&report, json)
}

fn print_report<R>(report: &R, json: bool) -> Result<()>
where
    R: serde::Serialize + std::fmt::Display,
{
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
    } else {
        println!("{report}");
    }
    Ok(())
}
