use clap::Parser;
use keyvault::cli::commands::{aes, delete, export, file, import_cmd, rsa};
use keyvault::cli::{AesAction, Cli, Commands, RsaAction};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    let result = match &cli.command {
        Commands::Aes { action } => match action {
            AesAction::Generate {
                name,
                bits,
                purpose,
            } => aes::generate(&cli, name, *bits, purpose),
            AesAction::List { purpose } => aes::list(&cli, purpose.as_deref()),
            AesAction::Encrypt { text, key, bits } => {
                aes::encrypt(&cli, text, key.as_deref(), *bits)
            }
            AesAction::Decrypt {
                ciphertext,
                key,
                bits,
            } => aes::decrypt(&cli, ciphertext, key.as_deref(), *bits),
        },
        Commands::Rsa { action } => match action {
            RsaAction::Generate {
                name,
                bits,
                protect,
            } => rsa::generate(&cli, name, *bits, *protect),
            RsaAction::List => rsa::list(&cli),
            RsaAction::Encrypt { id, text } => rsa::encrypt(&cli, id, text),
            RsaAction::Decrypt { id, ciphertext } => rsa::decrypt(&cli, id, ciphertext),
            RsaAction::ImportPublic { name, file } => rsa::import_public(&cli, name, file),
            RsaAction::Pem { id, private } => rsa::pem(&cli, id, *private),
        },
        Commands::Delete { id, force } => delete::execute(&cli, id, *force),
        Commands::Export { output, encrypt } => {
            export::execute(&cli, output.as_deref(), *encrypt)
        }
        Commands::Import { file } => import_cmd::execute(&cli, file),
        Commands::EncryptFile {
            input,
            output,
            bits,
        } => file::encrypt(&cli, input, output.as_deref(), *bits),
        Commands::DecryptFile {
            input,
            output,
            bits,
        } => file::decrypt(&cli, input, output.as_deref(), *bits),
    };

    if let Err(e) = result {
        keyvault::cli::output::error(&e.to_string());
        std::process::exit(1);
    }
}
