//! Dashboard and analytics.

use super::NoArgs;
use crate::error::Result;
use crate::function::QueryContext;
use crate::stats::{self, Analytics, Dashboard};

desk_query!(
    GetDashboard,
    "dashboard",
    "Ticket counts and recent tickets for the caller",
    NoArgs => Dashboard,
    dashboard
);

desk_query!(
    GetAnalytics,
    "analytics",
    "Desk-wide ticket figures",
    NoArgs => Analytics,
    analytics,
    admin
);

async fn dashboard(ctx: &QueryContext, _: NoArgs) -> Result<Dashboard> {
    stats::dashboard(ctx.store(), ctx.viewer()).await
}

async fn analytics(ctx: &QueryContext, _: NoArgs) -> Result<Analytics> {
    stats::analytics(ctx.store(), ctx.viewer()).await
}
