//! Route generator: greedy learning routes over the similarity triangle.
//!
//! A route starts from one document key and repeatedly follows the outgoing
//! edge with the maximum distance, keeping a visited set. The walk stops
//! when the current node has no outgoing edges, when several targets tie at
//! the maximum (a divergence: all of them are reported), or when the single
//! best target was already visited or is not a known title.

use anyhow::{bail, Result};
use sqlx::SqlitePool;
use std::collections::{BTreeMap, HashSet};
use std::io::{BufRead, Write};
use tracing::info;

use crate::config::Config;
use crate::models::{Route, RouteEnding, RouteStep};

/// Readable-title lookup: `title_<id>` key → document name.
pub async fn load_title_lookup(pool: &SqlitePool) -> Result<BTreeMap<String, String>> {
    let rows: Vec<(String, String)> = sqlx::query_as("SELECT id, file_name FROM file_info")
        .fetch_all(pool)
        .await?;
    Ok(rows
        .into_iter()
        .map(|(id, name)| (format!("title_{}", id), name))
        .collect())
}

/// Walk the triangle greedily from `start_key`.
pub async fn build_route(
    pool: &SqlitePool,
    start_key: &str,
    titles: &BTreeMap<String, String>,
) -> Result<Route> {
    let Some(start_title) = titles.get(start_key) else {
        bail!("unknown start node: {start_key}");
    };

    let mut visited: HashSet<String> = HashSet::new();
    visited.insert(start_key.to_string());

    let mut steps: Vec<RouteStep> = Vec::new();
    let mut diverged: Vec<RouteStep> = Vec::new();
    let mut current = start_key.to_string();

    let ending = loop {
        let rows: Vec<(String, f64)> = sqlx::query_as(
            "SELECT target_id, distance FROM item_matrix_triangle WHERE source_id = ?",
        )
        .bind(&current)
        .fetch_all(pool)
        .await?;

        if rows.is_empty() {
            break RouteEnding::NoFurtherRoute;
        }

        let max = rows
            .iter()
            .map(|(_, distance)| *distance)
            .fold(f64::NEG_INFINITY, f64::max);

        let mut best: Vec<&(String, f64)> =
            rows.iter().filter(|(_, distance)| *distance == max).collect();
        best.sort_by(|a, b| a.0.cmp(&b.0));
        best.dedup_by(|a, b| a.0 == b.0);

        if best.len() > 1 {
            diverged = best
                .into_iter()
                .map(|(key, distance)| RouteStep {
                    key: key.clone(),
                    title: titles.get(key).cloned().unwrap_or_else(|| key.clone()),
                    distance: *distance,
                })
                .collect();
            break RouteEnding::Diverged;
        }

        let (target, distance) = best[0];
        if visited.contains(target) || !titles.contains_key(target) {
            break RouteEnding::LoopOrUnreachable;
        }

        visited.insert(target.clone());
        steps.push(RouteStep {
            key: target.clone(),
            title: titles[target].clone(),
            distance: *distance,
        });
        current = target.clone();
    };

    Ok(Route {
        start_key: start_key.to_string(),
        start_title: start_title.clone(),
        steps,
        diverged,
        ending,
    })
}

/// Render one route as a single text record terminated by `END.`.
pub fn render_route(route: &Route) -> String {
    let mut parts: Vec<String> = vec![route.start_title.clone()];
    for step in &route.steps {
        parts.push(format!("{} ({})", step.title, step.distance));
    }

    match route.ending {
        RouteEnding::NoFurtherRoute => parts.push("[no further route]".to_string()),
        RouteEnding::Diverged => {
            let tied: Vec<String> = route
                .diverged
                .iter()
                .map(|step| format!("{} ({})", step.title, step.distance))
                .collect();
            parts.push(format!("{{ {} }} [path diverged]", tied.join(" | ")));
        }
        RouteEnding::LoopOrUnreachable => parts.push("[loop/unreachable]".to_string()),
    }

    parts.push("END.".to_string());
    parts.join(", ")
}

/// Append one route record to the configured route list.
pub fn append_route(config: &Config, route: &Route) -> Result<()> {
    let path = &config.routes.output_path;
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut file = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)?;
    writeln!(file, "{}", render_route(route))?;
    Ok(())
}

/// Interactive session: read start titles until a blank line or EOF, build a
/// route for each, append it to the route list, and echo it. Returns the
/// number of routes generated.
pub async fn run_route_session<R: BufRead>(
    config: &Config,
    pool: &SqlitePool,
    input: &mut R,
) -> Result<u64> {
    let titles = load_title_lookup(pool).await?;
    let by_name: BTreeMap<&str, &str> = titles
        .iter()
        .map(|(key, name)| (name.as_str(), key.as_str()))
        .collect();

    println!("create routes");
    println!("  known titles: {}", titles.len());

    let mut generated = 0u64;
    loop {
        print!("start title (blank to finish): ");
        std::io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let request = line.trim();
        if request.is_empty() {
            break;
        }

        // Accept either the readable title or the raw key.
        let start_key = match by_name.get(request) {
            Some(key) => (*key).to_string(),
            None if titles.contains_key(request) => request.to_string(),
            None => {
                println!("  unknown title: {}", request);
                continue;
            }
        };

        let route = build_route(pool, &start_key, &titles).await?;
        append_route(config, &route)?;
        println!("  {}", render_route(&route));
        generated += 1;
    }

    info!(generated, "route session finished");
    println!("  routes generated: {}", generated);
    println!("ok");

    Ok(generated)
}
