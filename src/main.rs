use std::process;
use std::time::Instant;

use env_logger;
use incremental_assignment::Simulator;


fn main() {
    env_logger::init();
    let config_path = match std::env::args().nth(1) {
        Some(path) => path,
        None => {
            eprintln!("usage: incremental_assignment <config.yaml>");
            process::exit(2);
        }
    };

    let t_main = Instant::now();
    let result = Simulator::from_cfg(&config_path).and_then(|mut sim| sim.run());
    match result {
        Ok(summaries) => {
            let reached: usize = summaries.iter().map(|ss| ss.num_reached).sum();
            let unreached: usize = summaries.iter().map(|ss| ss.num_unreached).sum();
            log::info!("simulated {} hours in {:.1} sec; {} OD pairs reached, {} not reached",
                       summaries.len(), t_main.elapsed().as_secs_f64(), reached, unreached);
        }
        Err(err) => {
            log::error!("assignment failed: {}", err);
            process::exit(1);
        }
    }
}
