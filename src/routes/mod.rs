pub mod default_route;
pub mod partida_route;
pub mod verification_route;
