pub mod manager;

pub use manager::{
    PortfolioPosition, RiskManager, RiskParameters, RiskReport, StressScenario,
};
