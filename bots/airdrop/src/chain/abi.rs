//! Embedded contract ABIs, limited to the functions the bot actually calls.

pub const MULTI_SEND: &str = r#"[
    {"type":"function","name":"multi_send_token","stateMutability":"payable","inputs":[{"name":"token","type":"address"},{"name":"addresses","type":"address[]"},{"name":"amounts","type":"uint256[]"}],"outputs":[]}
]"#;

pub const ERC20: &str = r#"[
    {"type":"function","name":"approve","stateMutability":"nonpayable","inputs":[{"name":"spender","type":"address"},{"name":"amount","type":"uint256"}],"outputs":[{"name":"","type":"bool"}]},
    {"type":"function","name":"allowance","stateMutability":"view","inputs":[{"name":"owner","type":"address"},{"name":"spender","type":"address"}],"outputs":[{"name":"","type":"uint256"}]},
    {"type":"function","name":"balanceOf","stateMutability":"view","inputs":[{"name":"account","type":"address"}],"outputs":[{"name":"","type":"uint256"}]}
]"#;

pub const ERC20_STAKING: &str = r#"[
    {"type":"function","name":"deposit","stateMutability":"nonpayable","inputs":[{"name":"amount","type":"uint256"}],"outputs":[]}
]"#;
