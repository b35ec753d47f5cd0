use salvo::prelude::*;
use serde_json::json;

use crate::web::web_state;

#[handler]
pub async fn health_check(res: &mut Response) {
    res.render("OK");
}

#[handler]
pub async fn get_status(depot: &mut Depot, res: &mut Response) {
    let Some(state) = web_state(depot) else {
        res.status_code(StatusCode::SERVICE_UNAVAILABLE);
        return;
    };

    let status = json!({
        "status": "running",
        "version": env!("CARGO_PKG_VERSION"),
        "uptime_seconds": state.started_at.elapsed().as_secs(),
        "irc": {
            "state": format!("{:?}", state.irc.state()),
        }
    });

    res.render(Json(status));
}
