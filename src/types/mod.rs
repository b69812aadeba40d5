pub mod confidence;
pub mod diplotype;
pub mod gene;
pub mod response;
pub mod variant;
