// ==========================================
// 表格批量导入系统 - 命令行入口
// ==========================================
// 命令:
// - submit: 登记导入任务并立即运行
// - retry:  重置失败任务，入队并处理
// - run:    同步运行指定任务
// - show:   输出任务 JSON
// ==========================================

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use sheet_import::api::SubmitImportRequest;
use sheet_import::app::{get_default_db_path, AppState};
use sheet_import::{logging, SchemaRegistry};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "sheet-import", version, about = "表格批量导入系统")]
struct Cli {
    /// 数据库路径（默认读取 SHEET_IMPORT_DB_PATH 或用户数据目录）
    #[arg(long, value_name = "PATH")]
    db: Option<String>,

    /// schema 定义文件（JSON）
    #[arg(long, value_name = "PATH", env = "SHEET_IMPORT_SCHEMAS")]
    schemas: Option<PathBuf>,

    /// 以 JSON 行格式输出日志
    #[arg(long)]
    json_logs: bool,

    #[command(subcommand)]
    cmd: Cmd,
}

#[derive(Subcommand)]
enum Cmd {
    /// 登记导入任务并立即运行
    Submit {
        /// 目标 schema 名称
        #[arg(long)]
        schema: String,
        /// 源文件（.xlsx / .csv）
        #[arg(long, value_name = "PATH")]
        file: PathBuf,
        /// 显式指定适配器（standard / trimmed）
        #[arg(long)]
        adapter: Option<String>,
        /// 结果文件消息语言
        #[arg(long)]
        locale: Option<String>,
    },
    /// 重试失败的导入任务
    Retry { id: String },
    /// 同步运行导入任务
    Run { id: String },
    /// 输出任务详情
    Show { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    if cli.json_logs {
        logging::init_json();
    } else {
        logging::init();
    }

    tracing::info!("表格批量导入系统 v{}", sheet_import::VERSION);

    let schemas = match &cli.schemas {
        Some(path) => SchemaRegistry::from_json_file(path)
            .map_err(|e| anyhow!("schema 文件读取失败 {}: {}", path.display(), e))?,
        None => SchemaRegistry::new(),
    };

    let db_path = cli.db.unwrap_or_else(get_default_db_path);
    tracing::info!("使用数据库: {}", db_path);
    let state = AppState::new(db_path, schemas)
        .await
        .map_err(|e| anyhow!(e))
        .context("无法初始化AppState")?;

    match cli.cmd {
        Cmd::Submit {
            schema,
            file,
            adapter,
            locale,
        } => {
            let job = state
                .import_api
                .submit(SubmitImportRequest {
                    schema_name: schema,
                    source_path: file.to_string_lossy().to_string(),
                    adapter,
                    locale,
                    created_by: std::env::var("USER").ok(),
                })
                .await?;
            let job = state.import_api.run(&job.id).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Cmd::Retry { id } => {
            let message = state.retry_service.retry(&id).await?;
            state.drain_queue().await;
            println!("{}", message);
        }
        Cmd::Run { id } => {
            let job = state.import_api.run(&id).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
        Cmd::Show { id } => {
            let job = state.import_api.get_job(&id).await?;
            println!("{}", serde_json::to_string_pretty(&job)?);
        }
    }

    Ok(())
}
