// Demo jobs: a producer, a failing producer and a consumer sharing one connection

use anyhow::{bail, Result};
use conduit_core::domain::{ExecutionIdentity, JobInput, Locale};
use conduit_core::port::{Destination, MessageConnection};
use conduit_core::{BoxError, JobContext, JobManager};
use conduit_infra_messaging::{InMemoryBroker, TransactionalMessaging};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

const ORDERS_QUEUE: &str = "orders";
const RECEIVE_TIMEOUT_MS: i64 = 200;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: u32,
    pub item: String,
    pub quantity: u32,
}

fn job_input(job_id: u64, name: &str) -> JobInput {
    JobInput::new(job_id)
        .with_name(name)
        .with_identity(ExecutionIdentity::new("demo-session", "conduit"))
        .with_locale(Locale::new("en-US"))
}

pub async fn run(manager: &JobManager, broker: &InMemoryBroker, order_count: u32) -> Result<()> {
    let connection: Arc<dyn MessageConnection> = broker.connect();
    let messaging = TransactionalMessaging::<Order>::json(connection);
    let orders = Destination::new(ORDERS_QUEUE);

    // 1. Producer commits its orders
    let (producer, queue) = (messaging.clone(), orders.clone());
    let published = manager
        .submit(
            move || -> Result<u32, BoxError> {
                for id in 1..=order_count {
                    let order = Order {
                        id,
                        item: format!("item-{}", id),
                        quantity: id * 2,
                    };
                    producer.publish(&queue, &order)?;
                }
                Ok(order_count)
            },
            job_input(1, "publish orders"),
        )?
        .join()
        .await?;
    info!(published, depth = broker.queue_depth(&orders), "Producer committed");

    // 2. A failing producer is rolled back; nothing reaches the queue
    let (producer, queue) = (messaging.clone(), orders.clone());
    let failed = manager
        .submit(
            move || -> Result<(), BoxError> {
                let order = Order {
                    id: 0,
                    item: "unpaid".to_string(),
                    quantity: 1,
                };
                producer.publish(&queue, &order)?;
                Err("payment declined".into())
            },
            job_input(2, "publish unpaid order"),
        )?
        .join()
        .await;
    if let Err(e) = &failed {
        info!(error = %e, depth = broker.queue_depth(&orders), "Failing producer rolled back");
    }

    // 3. Consumer drains the queue in one transaction
    let (consumer, queue) = (messaging, orders.clone());
    let (received, total) = manager
        .submit(
            move || -> Result<(u32, u32), BoxError> {
                let mut received = 0;
                let mut total = 0;
                while let Some(order) = consumer.receive(&queue, RECEIVE_TIMEOUT_MS)? {
                    if JobContext::current().is_some_and(|job| job.is_cancelled()) {
                        break;
                    }
                    received += 1;
                    total += order.quantity;
                }
                Ok((received, total))
            },
            job_input(3, "consume orders"),
        )?
        .join()
        .await?;
    info!(received, total_quantity = total, "Consumer committed");

    if received != published {
        bail!("expected {} orders, consumed {}", published, received);
    }
    Ok(())
}
