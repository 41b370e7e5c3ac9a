// Ticket endpoints

use crate::client::GisClient;
use crate::error::Error;
use crate::models::TicketWorkOrders;

impl GisClient {
    /// Work orders and area pocket of a ticket.
    ///
    /// `GET /api/ticket/{id}/work-orders/`
    pub async fn ticket_work_orders(&self, ticket_id: u64) -> Result<TicketWorkOrders, Error> {
        let url = self.api_url(&format!("ticket/{ticket_id}/work-orders/"))?;
        self.get(url).await
    }
}
