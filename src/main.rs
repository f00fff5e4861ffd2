use distributed_or_search::comm::{CommunicationLayer, CoworkerId, FolderCommLayer};
use distributed_or_search::events::EventEmitter;
use distributed_or_search::manager::ManagerConfig;
use distributed_or_search::search::{
    BestFirstSearch, CoworkerConfig, DistributedOrSearchCoworker, DistributedOrSearchMaster,
    GraphGenerator, NodeEvaluator,
};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Demonstration domain: binary splitting of an integer interval. Unit
/// intervals at the target values are the goals.
struct IntervalSplit {
    size: u64,
    targets: Vec<u64>,
}

impl GraphGenerator<(u64, u64), String> for IntervalSplit {
    fn roots(&self) -> Vec<(u64, u64)> {
        vec![(0, self.size)]
    }

    fn successors(&self, &(lo, hi): &(u64, u64)) -> Vec<(String, (u64, u64))> {
        if hi - lo <= 1 {
            return vec![];
        }
        let mid = (lo + hi) / 2;
        vec![
            ("left".to_string(), (lo, mid)),
            ("right".to_string(), (mid, hi)),
        ]
    }

    fn is_goal(&self, &(lo, hi): &(u64, u64)) -> bool {
        hi - lo == 1 && self.targets.contains(&lo)
    }
}

struct MidpointDistance {
    targets: Vec<u64>,
}

impl NodeEvaluator<(u64, u64), i64> for MidpointDistance {
    fn evaluate(&self, path: &[(u64, u64)]) -> i64 {
        let (lo, hi) = *path.last().unwrap_or(&(0, 0));
        let mid = (lo + hi) / 2;
        let dist = self
            .targets
            .iter()
            .map(|t| mid.abs_diff(*t))
            .min()
            .unwrap_or(0);
        (hi - lo + dist) as i64
    }
}

fn usage(program: &str) -> ! {
    eprintln!("Usage: {program} --role <master|coworker> --dir <folder> [options]");
    eprintln!("Options:");
    eprintln!("  --id <name>          coworker identity (default: random)");
    eprintln!("  --size <n>           interval size of the demo domain (default: 1024)");
    eprintln!("  --targets <a,b,..>   goal values (default: 3,500,997)");
    eprintln!("  --uptime-secs <s>    coworker availability window (default: 30)");
    eprintln!("  --budget-ms <ms>     per-job search budget (default: 1000)");
    eprintln!("Example: {program} --role master --dir /mnt/shared/search");
    eprintln!("Example: {program} --role coworker --dir /mnt/shared/search --id w1");
    std::process::exit(1);
}

#[derive(Debug)]
struct LaunchOptions {
    role: String,
    dir: PathBuf,
    id: Option<String>,
    size: u64,
    targets: Vec<u64>,
    uptime: Duration,
    budget: Duration,
}

/// Walks the `--flag value` pairs after the program name. A flag given as the
/// final argument has no value and is an error, not an out-of-bounds read.
fn parse_flags(args: &[String]) -> anyhow::Result<LaunchOptions> {
    let mut role: Option<String> = None;
    let mut dir: Option<PathBuf> = None;
    let mut id: Option<String> = None;
    let mut size: u64 = 1024;
    let mut targets: Vec<u64> = vec![3, 500, 997];
    let mut uptime = Duration::from_secs(30);
    let mut budget = Duration::from_millis(1000);

    let mut i = 0;
    while i < args.len() {
        let flag = args[i].as_str();
        if !flag.starts_with("--") {
            i += 1;
            continue;
        }
        let value = args
            .get(i + 1)
            .ok_or_else(|| anyhow::anyhow!("{flag} requires a value"))?;
        match flag {
            "--role" => role = Some(value.clone()),
            "--dir" => dir = Some(PathBuf::from(value)),
            "--id" => id = Some(value.clone()),
            "--size" => size = value.parse()?,
            "--targets" => {
                targets = value
                    .split(',')
                    .map(str::parse)
                    .collect::<Result<_, _>>()?;
            }
            "--uptime-secs" => uptime = Duration::from_secs(value.parse()?),
            "--budget-ms" => budget = Duration::from_millis(value.parse()?),
            _ => anyhow::bail!("unknown flag {flag}"),
        }
        i += 2;
    }

    Ok(LaunchOptions {
        role: role.ok_or_else(|| anyhow::anyhow!("--role is required"))?,
        dir: dir.ok_or_else(|| anyhow::anyhow!("--dir is required"))?,
        id,
        size,
        targets,
        uptime,
        budget,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();
    let options = match parse_flags(&args[1..]) {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{e}");
            usage(&args[0]);
        }
    };
    let LaunchOptions {
        role,
        dir,
        id,
        size,
        targets,
        uptime,
        budget,
    } = options;

    let generator = Arc::new(IntervalSplit {
        size,
        targets: targets.clone(),
    });
    let evaluator = Arc::new(MidpointDistance { targets });

    match role.as_str() {
        "master" => {
            let layer = FolderCommLayer::new(&dir);
            layer.init().await?;
            let comm: Arc<dyn CommunicationLayer<(u64, u64), String, i64>> = Arc::new(layer);

            tracing::info!("Master searching interval (0, {}) via {:?}", size, dir);
            let mut master = DistributedOrSearchMaster::new(
                generator,
                evaluator,
                comm,
                ManagerConfig::default(),
                EventEmitter::disabled(),
            );

            let mut count = 0usize;
            while let Some(path) = master.next_solution().await {
                count += 1;
                tracing::info!("Solution {}: {:?}", count, path.last());
            }
            tracing::info!(
                "Done: {} solution(s), {} node(s) materialized",
                count,
                master.graph_size()
            );
            master.shutdown().await;
        }
        "coworker" => {
            let id = id.map(CoworkerId).unwrap_or_else(CoworkerId::random);
            let comm: Arc<dyn CommunicationLayer<(u64, u64), String, i64>> =
                Arc::new(FolderCommLayer::new(&dir));
            let config = CoworkerConfig {
                uptime,
                search_budget: budget,
                ..CoworkerConfig::default()
            };

            let events = EventEmitter::disabled();
            let factory = Arc::new(move || {
                BestFirstSearch::new(generator.clone(), evaluator.clone(), events.clone())
            });
            let coworker = DistributedOrSearchCoworker::new(comm, id, config, factory);
            coworker.cowork().await?;
        }
        _ => usage(&args[0]),
    }

    Ok(())
}
