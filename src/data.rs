use serde::Deserialize;
use uuid::Uuid;

pub mod record;
pub mod user;

#[derive(Deserialize)]
pub struct IdForm {
    pub id: Uuid,
}
