use serde::Serialize;

use super::{DirectionId, RouteId, ServiceId, TripId};

#[derive(Clone, Debug, Serialize)]
pub struct Trip {
    pub id: TripId,
    pub route_id: RouteId,
    pub direction_id: DirectionId,
    pub headsign: Option<String>,
    pub service_id: Option<ServiceId>,
    pub shape_id: Option<String>,
}
