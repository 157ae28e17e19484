//! Demo business directory, seeded on first start so the app renders out
//! of the box. Business rows are otherwise externally managed.

use db::{
    DBService,
    models::business::{Business, CreateBusiness, LoyaltyType},
};
use tracing::info;
use uuid::Uuid;

pub async fn seed_demo_businesses(db: &DBService) -> Result<(), sqlx::Error> {
    if Business::count(&db.pool).await? > 0 {
        return Ok(());
    }

    let demo = [
        CreateBusiness {
            name: "Bella's Hair Studio".to_string(),
            category: "Salon".to_string(),
            address: "123 Main St, Downtown".to_string(),
            phone: "(555) 123-4567".to_string(),
            rating: 4.8,
            loyalty_type: LoyaltyType::VisitBased,
            reward_threshold: 10,
            next_reward: "Free haircut".to_string(),
        },
        CreateBusiness {
            name: "Tony's Barbershop".to_string(),
            category: "Barbershop".to_string(),
            address: "456 Oak Ave, Midtown".to_string(),
            phone: "(555) 234-5678".to_string(),
            rating: 4.9,
            loyalty_type: LoyaltyType::PointsBased,
            reward_threshold: 500,
            next_reward: "$20 off service".to_string(),
        },
        CreateBusiness {
            name: "Mama Rosa's Cafe".to_string(),
            category: "Eatery".to_string(),
            address: "789 Pine St, Historic District".to_string(),
            phone: "(555) 345-6789".to_string(),
            rating: 4.7,
            loyalty_type: LoyaltyType::VisitBased,
            reward_threshold: 8,
            next_reward: "Free lunch combo".to_string(),
        },
    ];

    for data in &demo {
        Business::create(&db.pool, data, Uuid::new_v4()).await?;
    }

    info!(count = demo.len(), "seeded demo business directory");
    Ok(())
}
