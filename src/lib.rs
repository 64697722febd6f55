pub mod asset;
pub mod contracts;
pub mod controller;
pub mod correlator;
pub mod deployment;
pub mod events;
pub mod model;
pub mod scheduler;
pub mod session;
pub mod view;
pub mod wallets;

pub mod test_helpers;

pub mod roulette_types {
    use fuels::macros::abigen;

    abigen!(Contract(
        name = "CryptoRoulette",
        abi = "abi/crypto-roulette-abi.json"
    ));
}

pub mod lottery_types {
    use fuels::macros::abigen;

    abigen!(Contract(
        name = "DailyLottery",
        abi = "abi/daily-lottery-abi.json"
    ));
}
