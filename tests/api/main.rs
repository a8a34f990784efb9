mod helpers;
mod verification;
