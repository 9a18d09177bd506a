use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result, anyhow, bail};
use base64::Engine;
use base64::engine::general_purpose::STANDARD as BASE64;
use clap::{Args, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use compass::config::{self, ClientConfig, load_config};
use compass::transport::{CometRpcTransport, Transport};
use compass::{BatchDecoder, Client, DecodedTransaction, default_seed, monitoring};

#[derive(Parser, Debug)]
#[command(name = "compass", version, about = "Cosmos-SDK 交易生命周期客户端")]
struct Cli {
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "配置文件路径（默认查找 compass.yaml 或 config/compass.yaml）"
    )]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// 初始化配置模版文件
    Init(InitCmd),
    /// 拉取节点 mempool 中的交易并解码为 JSON
    Mempool(MempoolCmd),
    /// 解码文件中的 base64 交易（每行一笔）
    Decode(DecodeCmd),
    /// 查询账户编号与 sequence
    Account(AccountCmd),
}

#[derive(Args, Debug)]
struct InitCmd {
    #[arg(long, value_name = "DIR", help = "可选输出目录（默认当前目录）")]
    output: Option<PathBuf>,
    #[arg(long, help = "若文件存在则覆盖")]
    force: bool,
    #[arg(long, default_value = "cosmoshub", help = "预设链：cosmoshub / osmosis / simd")]
    preset: String,
}

#[derive(Args, Debug)]
struct MempoolCmd {
    #[arg(long, help = "最多拉取的交易数量")]
    limit: Option<usize>,
    #[arg(long, help = "任意一笔解码失败即报错")]
    strict: bool,
}

#[derive(Args, Debug)]
struct DecodeCmd {
    #[arg(long, value_name = "FILE", help = "每行一笔 base64 编码的交易")]
    file: PathBuf,
    #[arg(long, help = "任意一笔解码失败即报错")]
    strict: bool,
}

#[derive(Args, Debug)]
struct AccountCmd {
    #[arg(long, help = "bech32 账户地址")]
    address: String,
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Init(args) => init_config(&args)?,
        Command::Mempool(args) => {
            let (client, transport) = bootstrap(cli.config)?;
            let raw = transport.unconfirmed_txs(args.limit).await?;
            let decoder = BatchDecoder::new(client.registry().clone());
            print_decoded(&decoder.decode_all(&raw, args.strict)?)?;
        }
        Command::Decode(args) => {
            let (client, _) = bootstrap(cli.config)?;
            let raw = read_base64_lines(&args.file)?;
            let decoder = BatchDecoder::new(client.registry().clone());
            print_decoded(&decoder.decode_all(&raw, args.strict)?)?;
        }
        Command::Account(args) => {
            let (_, transport) = bootstrap(cli.config)?;
            let account = transport
                .query_account(&args.address)
                .await
                .with_context(|| format!("查询账户 {} 失败", args.address))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "address": args.address,
                    "account_number": account.number.to_u64(),
                    "sequence": account.sequence.to_u64(),
                }))?
            );
        }
    }

    Ok(())
}

fn bootstrap(path: Option<PathBuf>) -> Result<(Client, CometRpcTransport)> {
    let config = load_config(path)?;
    init_tracing(&config.logging)?;

    monitoring::try_init_prometheus(&config.prometheus)?;

    let client = Client::new(config, default_seed())?;
    let transport = CometRpcTransport::new(
        &client.config().rpc_addr,
        client.config().request_timeout(),
    )?;
    info!(
        target: "compass",
        endpoint = %transport.endpoint(),
        chain_id = %client.config().chain_id,
        "compass started"
    );
    Ok((client, transport))
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

fn init_tracing(config: &config::LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    if config.json {
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .init();
    } else {
        fmt().with_env_filter(filter).init();
    }
    Ok(())
}

fn init_config(args: &InitCmd) -> Result<()> {
    let preset = ClientConfig::from_preset(&args.preset)
        .ok_or_else(|| anyhow!("未知的预设链: {}", args.preset))?;
    let output_dir = match &args.output {
        Some(dir) => dir.clone(),
        None => std::env::current_dir()?,
    };
    fs::create_dir_all(&output_dir)?;

    let target_path = output_dir.join(config::DEFAULT_CONFIG_PATHS[0]);
    if target_path.exists() && !args.force {
        println!(
            "跳过 {}（文件已存在，如需覆盖请加 --force）",
            target_path.display()
        );
        return Ok(());
    }

    fs::write(&target_path, serde_yaml::to_string(&preset)?)?;
    println!("已写入 {}", target_path.display());
    Ok(())
}

fn read_base64_lines(path: &Path) -> Result<Vec<Vec<u8>>> {
    let contents =
        fs::read_to_string(path).with_context(|| format!("读取 {} 失败", path.display()))?;
    let mut txs = Vec::new();
    for (line_no, line) in contents.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        match BASE64.decode(line) {
            Ok(bytes) => txs.push(bytes),
            Err(err) => bail!("第 {} 行不是合法的 base64: {err}", line_no + 1),
        }
    }
    Ok(txs)
}

fn print_decoded(decoded: &[DecodedTransaction]) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(decoded)?);
    Ok(())
}
