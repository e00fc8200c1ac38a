//! Command line map inspector: load an OpenDRIVE file, print its contents,
//! project world points and compute spawn transforms.

extern crate motoring;
#[macro_use]
extern crate failure;
extern crate structopt;

use structopt::StructOpt;

use motoring::road::coords::{LaneCoord, WorldCoord};
use motoring::{AdvancedQueries, AppResult, CoordinateTransformer, SpawnPlanner};

#[derive(StructOpt, Debug)]
#[structopt(name = "motoring", about = "Road network inspector for OpenDRIVE maps.")]
struct Opt {
    /// OpenDRIVE map file
    #[structopt(name = "FILE", parse(from_os_str))]
    file: std::path::PathBuf,

    /// List roads
    #[structopt(short = "r", long = "roads")]
    roads: bool,

    /// List junctions
    #[structopt(short = "j", long = "junctions")]
    junctions: bool,

    /// List signals and derived stop lines
    #[structopt(short = "s", long = "signals")]
    signals: bool,

    /// Project a world point x,y,z onto the road network
    #[structopt(long = "project")]
    project: Option<String>,

    /// Compute a spawn transform for road,lane,s
    #[structopt(long = "spawn")]
    spawn: Option<String>,

    /// Verbose output (-v, -vv)
    #[structopt(short = "v", long = "verbose", parse(from_occurrences))]
    verbose: u64,
}

fn parse_triple(input: &str) -> AppResult<(f64, f64, f64)> {
    let parts: Vec<&str> = input.split(',').map(|p| p.trim()).collect();
    if parts.len() != 3 {
        bail!("expected three comma-separated values, got {:?}", input);
    }
    Ok((parts[0].parse()?, parts[1].parse()?, parts[2].parse()?))
}

fn run(opt: &Opt) -> AppResult<()> {
    let net = motoring::get_road_network(&opt.file)?;
    println!(
        "{}: {} roads, {} junctions, {} signals",
        opt.file.display(),
        net.roads().count(),
        net.junctions().count(),
        net.signals().len()
    );

    if opt.roads {
        for road in net.roads() {
            println!(
                "road {:4} {:24} length {:8.2}{}",
                road.id,
                road.name,
                road.length,
                match road.junction {
                    Some(j) => format!("  (junction {})", j),
                    None => String::new(),
                }
            );
            if opt.verbose > 0 {
                for section in &road.sections {
                    let lanes: Vec<String> = section
                        .lanes
                        .keys()
                        .filter(|&&id| id != 0)
                        .map(|id| id.to_string())
                        .collect();
                    println!("    section s={:8.2} lanes [{}]", section.s_start, lanes.join(", "));
                }
            }
        }
    }

    if opt.junctions {
        let queries = AdvancedQueries::new(&net);
        for junction in queries.junctions() {
            println!("junction {:4} {}", junction.id, junction.name);
            for conn in &junction.connections {
                println!(
                    "    from road {} via road {} ({} lane links)",
                    conn.incoming_road,
                    conn.connecting_road,
                    conn.lane_links.len()
                );
            }
        }
    }

    if opt.signals {
        let queries = AdvancedQueries::new(&net);
        for sig in queries.traffic_signals() {
            println!(
                "signal {:8} road {:4} s={:8.2} t={:6.2} type {} ({:?})",
                sig.id, sig.road_id, sig.s, sig.t, sig.signal_type, sig.orientation
            );
        }
        for line in queries.stop_lines() {
            println!(
                "stop line for {:8} road {:4} lane {:3} s={:8.2}",
                line.signal_id, line.road_id, line.lane_id, line.s
            );
        }
    }

    if let Some(ref point) = opt.project {
        let (x, y, z) = parse_triple(point)?;
        let tr = CoordinateTransformer::new(&net);
        let w = WorldCoord::new(x, y, z);
        let rc = tr.world_to_road(&w)?;
        let lc = tr.world_to_lane(&w)?;
        println!(
            "{} -> road {} s={:.3} t={:.3} (lane {} offset {:.3})",
            w, rc.road_id, rc.s, rc.t, lc.lane_id, lc.offset
        );
    }

    if let Some(ref spawn) = opt.spawn {
        let (road, lane, s) = parse_triple(spawn)?;
        let planner = SpawnPlanner::new(&net);
        let lc = LaneCoord::new(road as i32, lane as i32, s);
        let t = planner.get_spawn_transform_from_lane(&lc)?;
        println!("spawn at {} yaw {:.4} rad", t.position, t.yaw);
    }

    Ok(())
}

fn main() {
    let opt = Opt::from_args();
    match run(&opt) {
        Ok(()) => {}
        Err(e) => {
            println!("Error: {}", e);
            for cause in e.iter_causes() {
                println!("  caused by: {}", cause);
            }
            std::process::exit(1);
        }
    }
}
