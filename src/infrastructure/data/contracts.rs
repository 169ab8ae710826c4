// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2026 ® John Hauger Mitander <john@on1.no>

use alloy::sol;

sol! {
    #[sol(rpc)]
    interface IGameManager {
        struct Round {
            uint256 roundId;
            uint8 pattern;
            uint256 minRange;
            uint256 maxRange;
        }

        function getCurrentRound() external view returns (Round memory);
    }
}

sol! {
    #[sol(rpc)]
    interface IMinerNFT {
        function getOwnedMiners(address owner) external view returns (uint256[] memory);
    }
}

sol! {
    #[sol(rpc)]
    interface IMiningEngine {
        struct MinerStats {
            string name;
            uint8 minerType;
            uint256 baseSuccessRate;
        }

        function getMinerStats(uint256 nftId) external view returns (MinerStats memory);
        function calculateEffectiveSuccessRate(uint256 nftId, uint8 pattern) external view returns (uint256);
        function attemptMining(uint256 nftId) external;

        event MiningAttemptMade(
            address indexed player,
            uint256 indexed nftId,
            uint256 randomNumber,
            bool success,
            uint256 roundId,
            uint256 timestamp
        );

        error NotOwner();
        error RoundClosed();
    }
}
