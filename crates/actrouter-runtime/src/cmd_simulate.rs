//! `actrouter simulate`: have the daemon play a scripted activity.

use actrouter_router::SimulationPlan;

use crate::cli::SimulateOpts;
use crate::client::rpc_call;

pub(crate) fn plan_from_opts(opts: &SimulateOpts) -> SimulationPlan {
    SimulationPlan {
        activity_id: opts.activity_id.clone(),
        title: opts.title.clone(),
        location: opts.location,
        count: opts.count,
        delay_ms: opts.delay_ms,
        clear_first: opts.clear,
        ..SimulationPlan::default()
    }
}

pub async fn cmd_simulate(socket_path: &str, opts: &SimulateOpts) -> anyhow::Result<()> {
    let plan = plan_from_opts(opts);
    let result = rpc_call(socket_path, "simulate", serde_json::to_value(&plan)?).await?;
    println!(
        "simulating {} on {}: {} events, {}ms apart",
        plan.activity_id,
        plan.location,
        result["events"],
        plan.delay_ms
    );
    Ok(())
}
