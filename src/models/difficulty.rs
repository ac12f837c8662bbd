//! 难度：出题范围、难度描述、每题得分

/// 难度枚举
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, serde::Serialize, serde::Deserialize)]
pub enum Difficulty {
    /// 入门
    Easy,
    /// 进阶
    #[default]
    Medium,
    /// 硬核
    Hard,
}

impl Difficulty {
    /// 全部难度，按界面展示顺序
    pub const ALL: [Difficulty; 3] = [Difficulty::Easy, Difficulty::Medium, Difficulty::Hard];

    /// 答对一题的得分
    pub fn points(self) -> u64 {
        match self {
            Difficulty::Easy => 5,
            Difficulty::Medium => 10,
            Difficulty::Hard => 20,
        }
    }

    /// 标准名称
    pub fn name(self) -> &'static str {
        match self {
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
        }
    }

    /// 出题范围
    pub fn topics(self) -> &'static str {
        match self {
            Difficulty::Easy => {
                "What is MegaETH, Blockchain Fundamentals, what is a wallet, what is Ethereum, \
                 what is a dApp, and what is a Layer 2 (L2)."
            }
            Difficulty::Medium => {
                "Layer 2 Rollups (General), ZK vs. Optimistic Rollups, and MegaETH Architecture \
                 (basic concepts)."
            }
            Difficulty::Hard => {
                "MegaETH Architecture (advanced concepts), sequencer design, rollup internals, \
                 and ZK proofs in practice."
            }
        }
    }

    /// 难度描述
    pub fn description(self) -> &'static str {
        match self {
            Difficulty::Easy => {
                "Easy. The questions must be suitable for a beginner who has just entered the \
                 Web3 space, focusing on the basics of MegaETH, how MegaETH works, the solutions \
                 MegaETH provides, and how MegaETH differs from other Layer 2 blockchains. Avoid \
                 deep technical jargon."
            }
            Difficulty::Medium => {
                "Medium. The user understands basic blockchain concepts but wants to learn about \
                 L2s and MegaETH specifically."
            }
            Difficulty::Hard => {
                "Hard. The user is an advanced Web3 user or developer. The questions should be \
                 highly specific and technical."
            }
        }
    }

    /// 从字符串解析难度
    ///
    /// 无法识别的输入一律按 Hard 处理
    pub fn parse_lenient(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "easy" => Difficulty::Easy,
            "medium" => Difficulty::Medium,
            _ => Difficulty::Hard,
        }
    }
}

impl std::fmt::Display for Difficulty {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
