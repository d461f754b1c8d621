use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::DateTime;
use clap::{Arg, ArgAction, ArgMatches, Command};
use jobcomp_core::config::AppConfig;
use jobcomp_domain::{describe, ErrorCode, HistoryParams, JobStepSelector};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod app;

use app::{Application, ArchiveRequest, QueryRequest};

#[tokio::main]
async fn main() -> Result<()> {
    let matches = build_cli().get_matches();

    let config_path = matches.get_one::<String>("config").map(String::as_str);
    let config = AppConfig::load(config_path).context("加载配置失败")?;

    let log_level = matches
        .get_one::<String>("log-level")
        .cloned()
        .unwrap_or_else(|| config.observability.log_level.clone());
    let log_format = matches
        .get_one::<String>("log-format")
        .cloned()
        .unwrap_or_else(|| config.observability.log_format.clone());
    init_logging(&log_level, &log_format)?;

    // 不需要打开数据库的命令
    if let Some(("describe-error", sub)) = matches.subcommand() {
        let code = *sub
            .get_one::<i32>("code")
            .context("缺少错误码参数")?;
        println!("{}", describe(ErrorCode(code)));
        return Ok(());
    }

    let app = Application::new(config);
    app.open().await?;

    let result = run_command(&app, &matches).await;
    app.shutdown().await;

    if let Err(e) = &result {
        error!("命令执行失败: {e:#}");
    }
    result
}

fn build_cli() -> Command {
    Command::new("jobcomp")
        .version("1.0.0")
        .about("作业完成记录存储")
        .subcommand_required(true)
        .arg(
            Arg::new("config")
                .short('c')
                .long("config")
                .value_name("FILE")
                .help("配置文件路径")
                .global(true),
        )
        .arg(
            Arg::new("log-level")
                .short('l')
                .long("log-level")
                .value_name("LEVEL")
                .help("日志级别")
                .value_parser(["trace", "debug", "info", "warn", "error"])
                .global(true),
        )
        .arg(
            Arg::new("log-format")
                .long("log-format")
                .value_name("FORMAT")
                .help("日志格式")
                .value_parser(["json", "pretty"])
                .global(true),
        )
        .subcommand(Command::new("init").about("初始化数据库并创建作业完成表"))
        .subcommand(
            Command::new("log")
                .about("写入作业完成记录")
                .arg(
                    Arg::new("file")
                        .value_name("JOB_JSON")
                        .help("作业JSON文件，可以是单个对象或数组")
                        .required(true)
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("query")
                .about("查询作业完成记录，以JSON输出")
                .arg(
                    Arg::new("job")
                        .short('j')
                        .long("job")
                        .value_name("JOB[.STEP]")
                        .help("作业ID，可重复或以逗号分隔")
                        .action(ArgAction::Append)
                        .value_delimiter(',')
                        .value_parser(clap::value_parser!(JobStepSelector)),
                )
                .arg(partition_arg())
                .arg(
                    Arg::new("since")
                        .long("since")
                        .value_name("TIME")
                        .help("结束时间不早于该时间 (epoch秒或RFC3339)")
                        .value_parser(parse_time),
                )
                .arg(
                    Arg::new("until")
                        .long("until")
                        .value_name("TIME")
                        .help("开始时间不晚于该时间 (epoch秒或RFC3339)")
                        .value_parser(parse_time),
                )
                .arg(
                    Arg::new("user")
                        .short('u')
                        .long("user")
                        .value_name("UID")
                        .help("用户ID")
                        .value_parser(clap::value_parser!(u32)),
                )
                .arg(
                    Arg::new("limit")
                        .long("limit")
                        .value_name("N")
                        .help("最多返回的记录数")
                        .value_parser(clap::value_parser!(u32)),
                ),
        )
        .subcommand(
            Command::new("archive")
                .about("归档并删除过期的作业完成记录")
                .arg(partition_arg())
                .arg(
                    Arg::new("retention-days")
                        .long("retention-days")
                        .value_name("DAYS")
                        .help("保留天数，默认取配置值")
                        .value_parser(clap::value_parser!(u32).range(1..)),
                )
                .arg(
                    Arg::new("export")
                        .long("export")
                        .value_name("FILE")
                        .help("删除前以JSON Lines追加导出到该文件")
                        .value_parser(clap::value_parser!(PathBuf)),
                ),
        )
        .subcommand(
            Command::new("describe-error")
                .about("显示错误码的含义")
                .arg(
                    Arg::new("code")
                        .value_name("CODE")
                        .required(true)
                        .allow_negative_numbers(true)
                        .value_parser(clap::value_parser!(i32)),
                ),
        )
}

fn partition_arg() -> Arg {
    Arg::new("partition")
        .short('p')
        .long("partition")
        .value_name("NAME")
        .help("分区名，可重复或以逗号分隔")
        .action(ArgAction::Append)
        .value_delimiter(',')
}

fn parse_time(value: &str) -> Result<i64, String> {
    if let Ok(epoch) = value.parse::<i64>() {
        return Ok(epoch);
    }
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.timestamp())
        .map_err(|e| format!("无效的时间 '{value}': {e}"))
}

fn collect_strings(matches: &ArgMatches, id: &str) -> Vec<String> {
    matches
        .get_many::<String>(id)
        .map(|values| values.cloned().collect())
        .unwrap_or_default()
}

async fn run_command(app: &Application, matches: &ArgMatches) -> Result<()> {
    match matches.subcommand() {
        Some(("init", _)) => {
            info!("作业完成表已就绪");
        }
        Some(("log", sub)) => {
            let path = sub.get_one::<PathBuf>("file").context("缺少作业文件参数")?;
            let count = app.log_jobs(path).await?;
            println!("已写入 {count} 条记录");
        }
        Some(("query", sub)) => {
            let request = QueryRequest {
                jobs: sub
                    .get_many::<JobStepSelector>("job")
                    .map(|values| values.copied().collect())
                    .unwrap_or_default(),
                partitions: collect_strings(sub, "partition"),
                params: HistoryParams {
                    since: sub.get_one::<i64>("since").copied(),
                    until: sub.get_one::<i64>("until").copied(),
                    user_id: sub.get_one::<u32>("user").copied(),
                    limit: sub.get_one::<u32>("limit").copied(),
                },
            };
            let records = app.query(&request).await?;
            let output = serde_json::to_string_pretty(&records).context("序列化查询结果失败")?;
            println!("{output}");
        }
        Some(("archive", sub)) => {
            let request = ArchiveRequest {
                partitions: collect_strings(sub, "partition"),
                retention_days: sub.get_one::<u32>("retention-days").copied(),
                export: sub.get_one::<PathBuf>("export").cloned(),
            };
            let summary = app.archive(request).await?;
            println!(
                "导出 {} 条，删除 {} 条",
                summary.exported, summary.deleted
            );
        }
        Some((other, _)) => return Err(anyhow::anyhow!("不支持的命令: {other}")),
        None => return Err(anyhow::anyhow!("未指定命令")),
    }
    Ok(())
}

/// 初始化日志系统
fn init_logging(log_level: &str, log_format: &str) -> Result<()> {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    let registry = tracing_subscriber::registry().with(env_filter);

    match log_format {
        "json" => {
            registry
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .try_init()
                .context("初始化JSON日志格式失败")?;
        }
        "pretty" => {
            registry
                .with(tracing_subscriber::fmt::layer().pretty().with_writer(std::io::stderr))
                .try_init()
                .context("初始化Pretty日志格式失败")?;
        }
        _ => {
            return Err(anyhow::anyhow!("不支持的日志格式: {log_format}"));
        }
    }

    Ok(())
}
