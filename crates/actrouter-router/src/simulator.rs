//! Scripted activity for exercising the router without a backend.

use std::time::Duration;

use actrouter_core::{ActivityEvent, Location};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::bridge::SimulatedSource;
use crate::error::BridgeError;
use crate::router::RouterHandle;

pub const DEFAULT_SIM_ACTIVITY_ID: &str = "test/simulation";
pub const DEFAULT_SIM_TITLE: &str = "Test Indexing";
pub const DEFAULT_SIM_COUNT: u32 = 10;
pub const DEFAULT_SIM_DELAY_MS: u64 = 1000;

/// One simulated activity: a start, `count` progress steps, a finish.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SimulationPlan {
    pub activity_id: String,
    pub title: String,
    pub location: Location,
    pub count: u32,
    /// Pause before each event after the start.
    pub delay_ms: u64,
    /// Id of the start event; later events count up from it.
    pub base_id: u64,
    /// Reset the router before the first event.
    pub clear_first: bool,
}

impl Default for SimulationPlan {
    fn default() -> Self {
        Self {
            activity_id: DEFAULT_SIM_ACTIVITY_ID.to_owned(),
            title: DEFAULT_SIM_TITLE.to_owned(),
            location: Location::Window,
            count: DEFAULT_SIM_COUNT,
            delay_ms: DEFAULT_SIM_DELAY_MS,
            base_id: 0,
            clear_first: false,
        }
    }
}

impl SimulationPlan {
    pub fn delay(&self) -> Duration {
        Duration::from_millis(self.delay_ms)
    }

    /// The full event sequence, in emission order.
    pub fn events(&self) -> Vec<ActivityEvent> {
        let n = u64::from(self.count);
        let mut events = Vec::with_capacity(self.count as usize + 2);
        events.push(ActivityEvent::start(
            self.base_id,
            &self.activity_id,
            &self.title,
            self.location.as_str(),
        ));
        for i in 1..=n {
            events.push(ActivityEvent::progress(
                self.base_id + i,
                &self.activity_id,
                format!("{i}/{n} (Simulated file {i})"),
            ));
        }
        events.push(ActivityEvent::finish(self.base_id + n + 1, &self.activity_id));
        events
    }
}

/// Play `plan` through `source`, waiting `plan.delay_ms` between events.
pub async fn simulate_activity(
    router: &RouterHandle,
    source: &SimulatedSource,
    plan: &SimulationPlan,
) -> Result<(), BridgeError> {
    if plan.clear_first {
        router.clear_events().await?;
    }
    info!(
        activity_id = %plan.activity_id,
        surface = %plan.location,
        count = plan.count,
        delay_ms = plan.delay_ms,
        "starting simulated activity"
    );
    for (i, event) in plan.events().iter().enumerate() {
        if i > 0 {
            tokio::time::sleep(plan.delay()).await;
        }
        source.inject_event(event).await?;
    }
    info!(activity_id = %plan.activity_id, "simulated activity finished");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::SubscriptionBridge;
    use crate::router::ActivityRouter;
    use actrouter_core::RouterConfig;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn default_plan_matches_demo_activity() {
        let plan = SimulationPlan::default();
        let events = plan.events();
        assert_eq!(events.len(), 12);
        assert_eq!(events[0].title(), Some("Test Indexing"));
        assert_eq!(events[0].location(), Some("window"));
        assert_eq!(events[3].detail(), Some("3/10 (Simulated file 3)"));
        assert!(events[11].is_finish());
        let ids: Vec<u64> = events.iter().map(ActivityEvent::id).collect();
        assert_eq!(ids, (0..12).collect::<Vec<_>>());
    }

    #[test]
    fn plan_deserializes_with_defaults() {
        let plan: SimulationPlan =
            serde_json::from_str(r#"{"count": 2, "location": "toast"}"#).expect("parse");
        assert_eq!(plan.count, 2);
        assert_eq!(plan.location, Location::Toast);
        assert_eq!(plan.activity_id, DEFAULT_SIM_ACTIVITY_ID);
        assert_eq!(plan.events().len(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn simulation_drives_router_through_lifecycle() {
        let (router, _task) = ActivityRouter::spawn(RouterConfig::default(), CancellationToken::new());
        let bridge = SubscriptionBridge::new(router.clone());
        let (source, _sub) = bridge.attach_simulated();
        let plan = SimulationPlan {
            count: 3,
            delay_ms: 50,
            ..SimulationPlan::default()
        };

        let run = tokio::spawn({
            let router = router.clone();
            let source = source.clone();
            let plan = plan.clone();
            async move { simulate_activity(&router, &source, &plan).await }
        });

        tokio::time::sleep(Duration::from_millis(75)).await;
        let window = router.surface(Location::Window).await.expect("window");
        assert!(window.active_activities.contains(&plan.activity_id));
        assert_eq!(
            window.start_title_for_activity(&plan.activity_id),
            Some(DEFAULT_SIM_TITLE)
        );

        run.await.expect("join").expect("simulation");
        tokio::time::sleep(Duration::from_millis(10)).await;
        let window = router.surface(Location::Window).await.expect("window");
        assert!(window.active_activities.is_empty());
        assert_eq!(window.progress_by_activity[&plan.activity_id].len(), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_first_resets_router() {
        let (router, _task) = ActivityRouter::spawn(RouterConfig::default(), CancellationToken::new());
        router
            .dispatch(ActivityEvent::oneshot(99, "old", "toast"))
            .await
            .expect("dispatch");
        let bridge = SubscriptionBridge::new(router.clone());
        let (source, _sub) = bridge.attach_simulated();
        let plan = SimulationPlan {
            count: 0,
            delay_ms: 0,
            clear_first: true,
            ..SimulationPlan::default()
        };
        simulate_activity(&router, &source, &plan).await.expect("simulation");
        tokio::time::sleep(Duration::from_millis(1)).await;
        let toast = router.surface(Location::Toast).await.expect("toast");
        assert!(toast.history.is_empty());
    }
}
