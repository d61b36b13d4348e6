//! REPL – operator console for a single Atlas agent and its fleet.
//!
//! Supported slash-commands:
//!   /pose x y [deg]            – set the pose used by the next /sense
//!   /sense f fl fr l r b       – run one cycle with readings in cm (`-` = none)
//!   /bounds                    – seed the arena edges as walls
//!   /item x y [conf]           – record a collectible
//!   /goal x y | /explore | /patrol x y x y … | /collect x y | /stop
//!   /decide <json>             – apply a raw decision payload
//!   /schema                    – print the decision JSON Schema
//!   /plan /frame /patch /grid /predict /status /decay
//!   /fleet add|sync|done|status
//!   /help, /quit | /exit

use colored::Colorize;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use atlas_codec::Frame;
use atlas_fleet::registry::lock_world;
use atlas_fleet::{FleetCoordinator, WorldRegistry};
use atlas_perception::world_model::{ArenaBounds, SensorDistances, WorldModel};
use atlas_runtime::{AgentSession, Decision, SensorUpdate, decision_schema, now_ms};
use atlas_types::{Pose, WorldPoint};
use tracing::warn;

use crate::config::Config;

/// Whether the loop should keep reading commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Entry point for the interactive REPL.
///
/// `shutdown` is polled each iteration; when set the REPL exits cleanly.
pub fn run(cfg: Config, shutdown: Arc<AtomicBool>) {
    let mut editor = match DefaultEditor::new() {
        Ok(editor) => editor,
        Err(e) => {
            eprintln!("{}: {}", "Failed to start line editor".red(), e);
            return;
        }
    };
    let mut shell = Shell::new(cfg);
    let prompt = format!("{} ", "atlas>".bold().cyan());

    loop {
        if shutdown.load(Ordering::SeqCst) {
            break;
        }
        match editor.readline(&prompt) {
            Ok(line) => {
                let cmd = line.trim();
                if cmd.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(cmd);
                if shell.execute(cmd) == Flow::Quit {
                    println!("{}", "Goodbye.".green());
                    shutdown.store(true, Ordering::SeqCst);
                    break;
                }
            }
            Err(ReadlineError::Interrupted) => {
                shutdown.store(true, Ordering::SeqCst);
                break;
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => {
                eprintln!("{}: {}", "Read error".red(), e);
                break;
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Shell state
// ─────────────────────────────────────────────────────────────────────────────

/// The local agent session plus a fleet it belongs to.
pub struct Shell {
    cfg: Config,
    session: AgentSession,
    registry: WorldRegistry,
    fleet: FleetCoordinator,
    pose: Pose,
}

impl Shell {
    pub fn new(cfg: Config) -> Self {
        let mut registry = WorldRegistry::new();
        let world = registry.insert(
            cfg.device_id.clone(),
            WorldModel::new(cfg.session.world.clone()),
        );
        let session = AgentSession::with_world(cfg.session.clone(), world);
        let mut fleet = FleetCoordinator::new(cfg.fleet.clone(), &cfg.session.world);
        if let Err(e) = fleet.register(&cfg.device_id, None, now_ms()) {
            warn!(error = %e, "local agent could not join the fleet");
        }
        Self {
            cfg,
            session,
            registry,
            fleet,
            pose: Pose::default(),
        }
    }

    /// Execute one command line.
    pub fn execute(&mut self, line: &str) -> Flow {
        let (cmd, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let args: Vec<&str> = rest.split_whitespace().collect();

        match cmd {
            "/help" => cmd_help(),
            "/pose" => self.cmd_pose(&args),
            "/sense" => self.cmd_sense(&args),
            "/bounds" => self.cmd_bounds(),
            "/item" => self.cmd_item(&args),
            "/goal" => match parse_point(&args) {
                Some(p) => self.decide(Decision::NavigateTo { x: p.x, y: p.y }),
                None => usage("/goal x y"),
            },
            "/explore" => self.decide(Decision::ExploreFrontier),
            "/patrol" => match parse_points(&args) {
                Some(waypoints) => self.decide(Decision::Patrol { waypoints }),
                None => usage("/patrol x y [x y …]"),
            },
            "/collect" => match parse_point(&args) {
                Some(p) => self.decide(Decision::MarkCollected { x: p.x, y: p.y }),
                None => usage("/collect x y"),
            },
            "/stop" => self.decide(Decision::Stop),
            "/decide" => self.cmd_decide(rest.trim()),
            "/schema" => println!("{:#}", decision_schema()),
            "/plan" => self.cmd_plan(),
            "/frame" => self.cmd_frame(),
            "/patch" => self.cmd_patch(),
            "/grid" => println!("{}", self.session.coarse_text()),
            "/predict" => self.cmd_predict(),
            "/status" => self.cmd_status(),
            "/decay" => {
                self.session.decay();
                println!("{}", "✓ Confidence decayed.".green());
            }
            "/fleet" => self.cmd_fleet(&args),
            "/quit" | "/exit" => return Flow::Quit,
            other => {
                println!(
                    "{} '{}'. Type {} for available commands.",
                    "Unknown command:".red(),
                    other.yellow(),
                    "/help".bold()
                );
            }
        }
        Flow::Continue
    }

    // ── Sensing ─────────────────────────────────────────────────────────────

    fn cmd_pose(&mut self, args: &[&str]) {
        let Some(p) = parse_point(args) else {
            return usage("/pose x y [deg]");
        };
        let rotation = match args.get(2).map(|s| s.parse::<f32>()) {
            Some(Ok(deg)) => deg.to_radians(),
            Some(Err(_)) => return usage("/pose x y [deg]"),
            None => self.pose.rotation,
        };
        self.pose = Pose::new(p.x, p.y, rotation, now_ms());
        println!(
            "  Pose set to ({:.2}, {:.2}) heading {}°",
            p.x,
            p.y,
            rotation.to_degrees().round() as i32
        );
    }

    fn cmd_sense(&mut self, args: &[&str]) {
        let Some(distances) = parse_distances(args) else {
            return usage("/sense f fl fr l r b   (cm, '-' for no reading)");
        };
        self.pose.timestamp = now_ms();
        let out = self.session.cycle(&SensorUpdate {
            pose: self.pose,
            distances,
        });
        if let Err(e) = self.fleet.update_pose(&self.cfg.device_id, self.pose, self.pose.timestamp) {
            warn!(error = %e, "fleet pose update failed");
        }

        let frame = match &out.frame {
            Frame::Full(f) => format!("full ({} RLE bytes)", f.rle.len()),
            Frame::Patch(p) => format!("patch ({} changes)", p.change_count),
        };
        println!(
            "  Cycle {} │ frame {} │ predicted {} (verified {}, wrong {})",
            out.cycle.to_string().bold(),
            frame.cyan(),
            out.prediction.applied,
            out.prediction.verified,
            out.prediction.wrong
        );
        if out.goal_reached {
            println!("  {}", "✓ Goal reached.".green().bold());
        }
        match &out.plan {
            Some(plan) if plan.success => println!(
                "  Plan: {} waypoints, {:.2} m, cost {:.1}",
                plan.waypoints.len(),
                plan.length_m,
                plan.total_cost
            ),
            Some(plan) => println!(
                "  Plan: {}",
                plan.error.as_deref().unwrap_or("failed").red()
            ),
            None => {}
        }
    }

    fn cmd_bounds(&mut self) {
        let shared = self.session.world();
        let mut world = lock_world(&shared);
        let (w, h) = world.grid().world_size_m();
        let half_cell = world.grid().resolution_m() / 2.0;
        let bounds = ArenaBounds {
            min_x: -w / 2.0 + half_cell,
            min_y: -h / 2.0 + half_cell,
            max_x: w / 2.0 - half_cell,
            max_y: h / 2.0 - half_cell,
        };
        let changed = world.initialize_boundaries(bounds, now_ms());
        println!("  {} {} boundary cells marked as wall", "✓".green(), changed);
    }

    fn cmd_item(&mut self, args: &[&str]) {
        let Some(p) = parse_point(args) else {
            return usage("/item x y [confidence]");
        };
        let confidence = args
            .get(2)
            .and_then(|s| s.parse::<f32>().ok())
            .unwrap_or(0.9)
            .clamp(0.0, 1.0);
        let shared = self.session.world();
        let changed = lock_world(&shared).mark_collectible(p, confidence, now_ms());
        if changed {
            println!("  {} collectible recorded", "✓".green());
        } else {
            println!("  {}", "Cell unchanged (outside grid or stronger state).".yellow());
        }
    }

    // ── Decisions ───────────────────────────────────────────────────────────

    fn decide(&mut self, decision: Decision) {
        let action = decision.action();
        match self.session.apply_decision(decision, now_ms()) {
            Ok(goal) => print_decision(action, goal),
            Err(e) => println!("{}: {}", "Decision rejected".red(), e),
        }
    }

    fn cmd_decide(&mut self, json: &str) {
        if json.is_empty() {
            return usage(r#"/decide {"action":"navigate_to","payload":{"x":1.0,"y":0.5}}"#);
        }
        match self.session.handle_decision_json(json, now_ms()) {
            Ok(goal) => print_decision("decision", goal),
            Err(e) => println!("{}: {}", "Decision rejected".red(), e),
        }
    }

    // ── Outputs ─────────────────────────────────────────────────────────────

    fn cmd_plan(&self) {
        match self.session.plan_to_goal() {
            None => println!("  {}", "No goal or no pose yet.".yellow()),
            Some(Err(e)) => println!("  {}: {}", "Planning failed".red(), e),
            Some(Ok(path)) => {
                println!(
                    "  {} cells, {:.2} m, cost {:.1}, {:.2} ms",
                    path.raw_path_length,
                    path.length_m,
                    path.total_cost,
                    path.planning_time_ms
                );
                for (i, wp) in path.waypoints.iter().enumerate() {
                    println!(
                        "    {:>2}. ({:.2}, {:.2})  [{}, {}]",
                        i + 1,
                        wp.position.x,
                        wp.position.y,
                        wp.coord.gx,
                        wp.coord.gy
                    );
                }
            }
        }
    }

    fn cmd_frame(&mut self) {
        let frame = Frame::Full(self.session.full_frame());
        print_json(frame.to_json());
    }

    fn cmd_patch(&mut self) {
        match self.session.patch_frame() {
            Ok(patch) => print_json(Frame::Patch(patch).to_json()),
            Err(e) => println!("{}: {}", "Patch unavailable".red(), e),
        }
    }

    fn cmd_predict(&mut self) {
        let report = self.session.predict(now_ms());
        let stats = self.session.predictor_stats();
        println!(
            "  Proposed {} │ applied {} │ verified {} │ wrong {}",
            report.proposed, report.applied, report.verified, report.wrong
        );
        println!(
            "  Outstanding {} │ accuracy {:.1}%",
            stats.prediction_count,
            stats.accuracy * 100.0
        );
    }

    fn cmd_status(&self) {
        println!("{}", "World".bold().underline());
        println!("{}", self.session.summary_text());
        match self.session.goal() {
            Some(g) => println!("Goal: ({:.2}, {:.2})", g.x, g.y),
            None => println!("Goal: none"),
        }
        println!();
        println!("{}", "Fleet".bold().underline());
        println!("{}", self.fleet.status_text());
    }

    // ── Fleet ───────────────────────────────────────────────────────────────

    fn cmd_fleet(&mut self, args: &[&str]) {
        match args.first().copied() {
            Some("add") => self.fleet_add(&args[1..]),
            Some("sync") => self.fleet_sync(),
            Some("done") => self.fleet_done(&args[1..]),
            Some("status") | None => println!("{}", self.fleet.status_text()),
            Some(other) => println!("{} '{}'", "Unknown fleet command:".red(), other.yellow()),
        }
    }

    /// Register a simulated peer with its own empty world.
    fn fleet_add(&mut self, args: &[&str]) {
        let Some(id) = args.first() else {
            return usage("/fleet add <device-id> [x y]");
        };
        let pose = parse_point(&args[1..]).map(|p| Pose::new(p.x, p.y, 0.0, now_ms()));
        match self.fleet.register(id, pose, now_ms()) {
            Ok(()) => {
                self.registry
                    .insert(*id, WorldModel::new(self.cfg.session.world.clone()));
                println!("  {} {} joined the fleet", "✓".green(), id.bold());
            }
            Err(e) => println!("{}: {}", "Registration failed".red(), e),
        }
    }

    /// Merge every member map, hand out frontiers and push the shared map
    /// back.
    fn fleet_sync(&mut self) {
        let merge = self.fleet.merge(&self.registry);
        let frontiers = {
            let shared = self.session.world();
            let world = lock_world(&shared);
            world.find_frontiers()
        };
        let tasks = self.fleet.assign_frontiers(&frontiers);
        let dist = self.fleet.distribute(&self.registry);
        println!(
            "  Merged {} member(s), {} cell(s) updated │ shared {} cell(s) to {} member(s)",
            merge.members_merged, merge.cells_updated, dist.cells_shared, dist.members_updated
        );
        for task in &tasks {
            println!(
                "    {} {} → {} ({:.2}, {:.2})",
                task.short_id().dimmed(),
                task.kind.as_str(),
                task.assignee.as_deref().unwrap_or("-").bold(),
                task.target.x,
                task.target.y
            );
        }
    }

    fn fleet_done(&mut self, args: &[&str]) {
        let Some(prefix) = args.first() else {
            return usage("/fleet done <task-id-prefix>");
        };
        let id = self
            .fleet
            .tasks()
            .iter()
            .find(|t| t.id.starts_with(prefix))
            .map(|t| t.id.clone());
        match id.map(|id| self.fleet.complete_task(&id)) {
            Some(Ok(task)) => println!("  {} task {} completed", "✓".green(), task.short_id()),
            Some(Err(e)) => println!("{}: {}", "Completion failed".red(), e),
            None => println!("{} '{}'", "No task matches".red(), prefix.yellow()),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Helpers
// ─────────────────────────────────────────────────────────────────────────────

fn cmd_help() {
    println!();
    println!("{}", "Atlas Commands".bold().underline());
    println!("  {}   – set the robot pose", "/pose x y [deg]".bold().cyan());
    println!("  {}   – run one cycle (cm, '-' = none)", "/sense f fl fr l r b".bold().cyan());
    println!("  {}   – seed arena edges as walls", "/bounds".bold().cyan());
    println!("  {}   – record a collectible", "/item x y [conf]".bold().cyan());
    println!("  {}   – navigate to a point", "/goal x y".bold().cyan());
    println!("  {}   – head for the best frontier", "/explore".bold().cyan());
    println!("  {}   – visit waypoints in order", "/patrol x y …".bold().cyan());
    println!("  {}   – mark a collectible as picked up", "/collect x y".bold().cyan());
    println!("  {}   – drop the current goal", "/stop".bold().cyan());
    println!("  {}   – apply a JSON decision payload", "/decide <json>".bold().cyan());
    println!("  {}   – print the decision JSON Schema", "/schema".bold().cyan());
    println!("  {}   – plan from the pose to the goal", "/plan".bold().cyan());
    println!("  {}   – full / delta JSON frame", "/frame  /patch".bold().cyan());
    println!("  {}   – coarse text map", "/grid".bold().cyan());
    println!("  {}   – run a prediction pass", "/predict".bold().cyan());
    println!("  {}   – world and fleet summary", "/status".bold().cyan());
    println!("  {}   – decay map confidence", "/decay".bold().cyan());
    println!("  {}   – fleet management", "/fleet add|sync|done|status".bold().cyan());
    println!("  {}   – exit the CLI", "/quit  /exit".bold().cyan());
    println!();
}

fn usage(text: &str) {
    println!("{} {}", "Usage:".yellow(), text);
}

fn print_decision(action: &str, goal: Option<WorldPoint>) {
    match goal {
        Some(g) => println!(
            "  {} {} → goal ({:.2}, {:.2})",
            "✓".green(),
            action,
            g.x,
            g.y
        ),
        None => println!("  {} {} → no goal", "✓".green(), action),
    }
}

fn print_json(json: Result<String, atlas_codec::CodecError>) {
    match json {
        Ok(s) => println!("{s}"),
        Err(e) => println!("{}: {}", "Encoding failed".red(), e),
    }
}

/// `x y` from the first two arguments.
fn parse_point(args: &[&str]) -> Option<WorldPoint> {
    let x = args.first()?.parse::<f32>().ok()?;
    let y = args.get(1)?.parse::<f32>().ok()?;
    let p = WorldPoint::new(x, y);
    p.is_finite().then_some(p)
}

/// Consecutive `x y` pairs; `None` on an odd count, a bad number or no
/// pairs at all.
fn parse_points(args: &[&str]) -> Option<Vec<WorldPoint>> {
    if args.is_empty() || args.len() % 2 != 0 {
        return None;
    }
    args.chunks(2).map(parse_point).collect()
}

/// One reading in cm; `-` means no reading.
fn parse_reading(raw: &str) -> Result<Option<f32>, ()> {
    if raw == "-" {
        return Ok(None);
    }
    match raw.parse::<f32>() {
        Ok(v) if v.is_finite() && v >= 0.0 => Ok(Some(v)),
        _ => Err(()),
    }
}

/// Up to six readings in front, front-left, front-right, left, right, back
/// order.  Missing trailing readings are treated as absent.
fn parse_distances(args: &[&str]) -> Option<SensorDistances> {
    if args.len() > 6 {
        return None;
    }
    let mut readings = [None; 6];
    for (slot, raw) in readings.iter_mut().zip(args) {
        *slot = parse_reading(raw).ok()?;
    }
    let [front, front_left, front_right, left, right, back] = readings;
    Some(SensorDistances {
        front,
        front_left,
        front_right,
        left,
        right,
        back,
    })
}
